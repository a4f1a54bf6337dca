use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "prompted", version, author, about = "A quiet terminal prayer journal with gentle reminders")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a prayer request
    Add {
        /// Short title
        title: String,
        /// Longer description, shown in reminders
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List prayer requests (active first)
    List {
        /// Only show answered prayers
        #[arg(long, conflicts_with = "active")]
        answered: bool,
        /// Only show active prayers
        #[arg(long)]
        active: bool,
    },
    /// Show one prayer request in full
    Show {
        /// Prayer id or a unique prefix of it
        id: String,
    },
    /// Change the title or description of a prayer
    Edit {
        /// Prayer id or a unique prefix of it
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Record that you prayed for a request
    Pray {
        /// Prayer id or a unique prefix of it
        id: String,
    },
    /// Mark a prayer as answered
    Answer {
        /// Prayer id or a unique prefix of it
        id: String,
        /// How it was answered
        #[arg(short, long)]
        reflection: Option<String>,
    },
    /// Move an answered prayer back to active
    Reopen {
        /// Prayer id or a unique prefix of it
        id: String,
    },
    /// Write or replace the reflection on an answered prayer
    Reflect {
        /// Prayer id or a unique prefix of it
        id: String,
        /// Reflection text
        text: String,
    },
    /// Delete a prayer request
    Delete {
        /// Prayer id or a unique prefix of it
        id: String,
    },
    /// Set a one-off reminder for a prayer
    Remind {
        /// Prayer id or a unique prefix of it
        id: String,
        /// When: +30m, +2h, +1d, HH:MM or "YYYY-MM-DD HH:MM"
        when: String,
    },
    /// Cancel the one-off reminder for a prayer
    Forget {
        /// Prayer id or a unique prefix of it
        id: String,
    },
    /// Show or change how often random reminders fire
    Frequency {
        /// 15-mins, 30-mins, 1-hour, 3-hours, 6-hours or custom
        selector: Option<String>,
        /// Hours between reminders for the custom frequency
        #[arg(long)]
        hours: Option<f64>,
    },
    /// Rebuild the batch of random reminders now
    Reschedule,
    /// List reminders waiting to be delivered
    Pending,
    /// Deliver reminders whose time has come
    Due,
    /// Notification permission
    Notifications {
        #[command(subcommand)]
        action: NotificationCommands,
    },
    /// Export all prayers as JSON to stdout
    Export,
}

#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    /// Allow reminders and schedule them
    Enable,
    /// Stop random reminders and refuse new ones
    Disable,
    /// Show permission and backend
    Status,
}
