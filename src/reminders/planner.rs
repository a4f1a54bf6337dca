use chrono::{DateTime, Utc};
use log::warn;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::models::reminder::BATCH_SIZE;
use crate::models::{PrayerRequest, ReminderId, ReminderPayload, ReminderSpec};
use crate::reminders::frequency::Interval;

const BATCH_TITLE: &str = "Time to pray";
const DEFAULT_BODY: &str = "Take a moment to pray for this request";

/// Plan the next batch of reminders.
///
/// Slot `i` (1-based) fires `i` intervals after `now` and carries id
/// `BATCH_ID_BASE + i`. Each slot draws an active prayer uniformly and with
/// replacement, so a prayer may appear in several slots. Returns an empty batch
/// when nothing is active.
pub fn plan_batch<R: Rng + ?Sized>(
    prayers: &[PrayerRequest],
    interval: Interval,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<ReminderSpec> {
    let active: Vec<&PrayerRequest> = prayers.iter().filter(|p| p.is_active()).collect();
    if active.is_empty() {
        return Vec::new();
    }

    let mut batch = Vec::with_capacity(BATCH_SIZE);
    for slot in 1..=BATCH_SIZE {
        let Some(prayer) = active.choose(rng) else {
            break;
        };
        let Some(fire_at) = now.checked_add_signed(interval.times(slot)) else {
            warn!("slot {} is past the end of time, batch cut short", slot);
            break;
        };
        batch.push(ReminderSpec {
            id: ReminderId::batch_slot(slot),
            title: format!("{}: {}", BATCH_TITLE, prayer.title),
            body: reminder_body(&prayer.description),
            fire_at,
            payload: ReminderPayload {
                prayer_id: prayer.id.clone(),
                is_batch_reminder: true,
            },
        });
    }
    batch
}

pub(crate) fn reminder_body(description: &str) -> String {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        DEFAULT_BODY.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::frequency::{Frequency, MIN_INTERVAL_HOURS};
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn prayers(titles: &[&str]) -> Vec<PrayerRequest> {
        titles
            .iter()
            .map(|t| PrayerRequest::new(t, "").unwrap())
            .collect()
    }

    #[test]
    fn no_prayers_means_no_batch() {
        let mut rng = StdRng::seed_from_u64(7);
        let batch = plan_batch(&[], Interval::default(), Utc::now(), &mut rng);
        assert!(batch.is_empty());
    }

    #[test]
    fn answered_prayers_are_never_picked() {
        let mut list = prayers(&["a", "b"]);
        list[0].mark_answered(Utc::now(), None);
        let mut rng = StdRng::seed_from_u64(1);
        let batch = plan_batch(&list, Interval::default(), Utc::now(), &mut rng);
        assert_eq!(batch.len(), BATCH_SIZE);
        assert!(batch.iter().all(|s| s.payload.prayer_id == list[1].id));

        list[1].mark_answered(Utc::now(), None);
        assert!(plan_batch(&list, Interval::default(), Utc::now(), &mut rng).is_empty());
    }

    #[test]
    fn hourly_batch_for_three_prayers() {
        let list = prayers(&["family", "work", "health"]);
        let ids: HashSet<_> = list.iter().map(|p| p.id.clone()).collect();
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(42);

        let batch = plan_batch(&list, Frequency::OneHour.interval(None), now, &mut rng);

        assert_eq!(batch.len(), 20);
        for (i, spec) in batch.iter().enumerate() {
            let slot = i + 1;
            assert_eq!(spec.fire_at, now + Duration::hours(slot as i64));
            assert_eq!(spec.id, ReminderId(1000 + slot as i32));
            assert!(spec.payload.is_batch_reminder);
            assert!(ids.contains(&spec.payload.prayer_id));
        }
    }

    #[test]
    fn fire_times_are_evenly_spaced_and_future() {
        let list = prayers(&["one"]);
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(3);
        let interval = Frequency::FifteenMins.interval(None);
        let batch = plan_batch(&list, interval, now, &mut rng);

        assert!(batch[0].fire_at > now);
        for pair in batch.windows(2) {
            assert_eq!(pair[1].fire_at - pair[0].fire_at, Duration::minutes(15));
        }
    }

    #[test]
    fn shortest_interval_still_spreads_slots() {
        let list = prayers(&["one"]);
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(8);
        let interval = Interval::from_hours(MIN_INTERVAL_HOURS).unwrap();
        let batch = plan_batch(&list, interval, now, &mut rng);

        assert_eq!(batch.len(), BATCH_SIZE);
        assert!(batch[0].fire_at > now);
        for pair in batch.windows(2) {
            assert_eq!(pair[1].fire_at - pair[0].fire_at, Duration::minutes(1));
        }
    }

    #[test]
    fn oversized_custom_hours_plan_hourly() {
        let list = prayers(&["one"]);
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(9);
        let batch = plan_batch(&list, Frequency::Custom.interval(Some(1e9)), now, &mut rng);

        assert_eq!(batch.len(), BATCH_SIZE);
        assert_eq!(batch[19].fire_at, now + Duration::hours(20));
    }

    #[test]
    fn sampling_reaches_every_active_prayer() {
        let list = prayers(&["a", "b", "c"]);
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = HashSet::new();
        for _ in 0..10 {
            for spec in plan_batch(&list, Interval::default(), Utc::now(), &mut rng) {
                seen.insert(spec.payload.prayer_id);
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn body_falls_back_when_description_blank() {
        let mut list = prayers(&["a"]);
        let mut rng = StdRng::seed_from_u64(5);
        let batch = plan_batch(&list, Interval::default(), Utc::now(), &mut rng);
        assert_eq!(batch[0].body, DEFAULT_BODY);
        assert_eq!(batch[0].title, "Time to pray: a");

        list[0].description = "  for strength  ".into();
        let batch = plan_batch(&list, Interval::default(), Utc::now(), &mut rng);
        assert_eq!(batch[0].body, "for strength");
    }
}
