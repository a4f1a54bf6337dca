use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::Rng;

use crate::models::{PrayerRequest, ReminderId, ReminderPayload, ReminderSpec};
use crate::reminders::error::ReminderError;
use crate::reminders::frequency::Interval;
use crate::reminders::gateway::{NotificationGateway, NotificationPlatform};
use crate::reminders::planner::{plan_batch, reminder_body};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchState {
    Absent,
    Present {
        first: ReminderId,
        last: ReminderId,
        until: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Nothing active to pray for; the old batch is gone and nothing replaced it.
    Empty,
    Scheduled {
        count: usize,
        first_at: DateTime<Utc>,
        last_at: DateTime<Utc>,
    },
}

/// Owns the reminder categories and their transitions.
///
/// There is at most one batch. Every reschedule cancels the whole batch id
/// range before submitting a fresh plan, so ids from an older batch can never
/// linger. Manual reminders use per-prayer ids outside that range and are
/// never touched by batch operations.
pub struct ReminderManager<P> {
    gateway: NotificationGateway<P>,
    batch: BatchState,
}

impl<P: NotificationPlatform> ReminderManager<P> {
    pub fn new(gateway: NotificationGateway<P>) -> Self {
        Self {
            gateway,
            batch: BatchState::Absent,
        }
    }

    pub fn gateway(&self) -> &NotificationGateway<P> {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut NotificationGateway<P> {
        &mut self.gateway
    }

    pub fn batch_state(&self) -> &BatchState {
        &self.batch
    }

    fn ensure_permission(&self) -> Result<(), ReminderError> {
        if self.gateway.check_permission().is_granted() {
            Ok(())
        } else {
            Err(ReminderError::PermissionDenied)
        }
    }

    /// Replace the batch with a fresh plan over `prayers`.
    pub fn reschedule<R: Rng + ?Sized>(
        &mut self,
        prayers: &[PrayerRequest],
        interval: Interval,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<BatchOutcome, ReminderError> {
        self.ensure_permission()?;

        self.gateway.cancel_many(&ReminderId::batch_range())?;
        self.batch = BatchState::Absent;

        let batch = plan_batch(prayers, interval, now, rng);
        let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
            info!("no active prayers, batch cleared");
            return Ok(BatchOutcome::Empty);
        };
        let outcome = BatchOutcome::Scheduled {
            count: batch.len(),
            first_at: first.fire_at,
            last_at: last.fire_at,
        };
        let state = BatchState::Present {
            first: first.id,
            last: last.id,
            until: last.fire_at,
        };

        self.gateway.schedule_many(&batch)?;
        self.batch = state;
        info!(
            "scheduled {} reminders every {}h",
            batch.len(),
            interval.hours()
        );
        Ok(outcome)
    }

    /// Cancel the batch without planning a new one.
    pub fn clear_batch(&mut self) -> Result<(), ReminderError> {
        self.gateway.cancel_many(&ReminderId::batch_range())?;
        self.batch = BatchState::Absent;
        Ok(())
    }

    /// Schedule the single manual reminder for a prayer, replacing any earlier one.
    pub fn schedule_manual(
        &mut self,
        prayer_id: &str,
        title: &str,
        body: &str,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ReminderSpec, ReminderError> {
        if at <= now {
            return Err(ReminderError::InvalidSchedule { at, now });
        }
        self.ensure_permission()?;

        let spec = ReminderSpec {
            id: ReminderId::for_prayer(prayer_id),
            title: format!("Prayer Reminder: {}", title),
            body: reminder_body(body),
            fire_at: at,
            payload: ReminderPayload {
                prayer_id: prayer_id.to_string(),
                is_batch_reminder: false,
            },
        };
        self.gateway.schedule_many(std::slice::from_ref(&spec))?;
        debug!("manual reminder {} set for {}", spec.id, at);
        Ok(spec)
    }

    pub fn cancel_manual(&mut self, prayer_id: &str) -> Result<ReminderId, ReminderError> {
        let id = ReminderId::for_prayer(prayer_id);
        self.gateway.cancel_many(&[id])?;
        debug!("manual reminder {} cancelled", id);
        Ok(id)
    }

    /// A prayer just moved to answered: drop its manual reminder and re-plan
    /// the batch without it. The re-plan runs even if the cancel fails; the
    /// first error wins.
    pub fn prayer_answered<R: Rng + ?Sized>(
        &mut self,
        prayer_id: &str,
        prayers: &[PrayerRequest],
        interval: Interval,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<BatchOutcome, ReminderError> {
        let cancelled = self.cancel_manual(prayer_id);
        let outcome = self.reschedule(prayers, interval, now, rng);
        cancelled?;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reminder::BATCH_SIZE;
    use crate::reminders::frequency::Frequency;
    use crate::reminders::gateway::fake::{PlatformCall, RecordingPlatform};
    use crate::reminders::gateway::PermissionState;
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn manager(platform: RecordingPlatform) -> ReminderManager<RecordingPlatform> {
        ReminderManager::new(NotificationGateway::new(platform, None))
    }

    fn prayers(n: usize) -> Vec<PrayerRequest> {
        (0..n)
            .map(|i| PrayerRequest::new(&format!("prayer {i}"), "").unwrap())
            .collect()
    }

    fn hourly() -> Interval {
        Frequency::OneHour.interval(None)
    }

    #[test]
    fn reschedule_cancels_full_range_then_submits() {
        let mut m = manager(RecordingPlatform::granted());
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc::now();
        let outcome = m.reschedule(&prayers(3), hourly(), now, &mut rng).unwrap();

        assert_eq!(
            outcome,
            BatchOutcome::Scheduled {
                count: BATCH_SIZE,
                first_at: now + Duration::hours(1),
                last_at: now + Duration::hours(20),
            }
        );
        let calls = &m.gateway().platform().calls;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], PlatformCall::Cancel(ReminderId::batch_range()));
        assert!(matches!(calls[1], PlatformCall::Schedule(_)));
        assert_eq!(
            m.batch_state(),
            &BatchState::Present {
                first: ReminderId(1001),
                last: ReminderId(1020),
                until: now + Duration::hours(20),
            }
        );
    }

    #[test]
    fn rescheduling_twice_leaves_one_batch() {
        let mut m = manager(RecordingPlatform::granted());
        let mut rng = StdRng::seed_from_u64(2);
        let list = prayers(2);
        let now = Utc::now();
        m.reschedule(&list, hourly(), now, &mut rng).unwrap();
        m.reschedule(&list, hourly(), now, &mut rng).unwrap();

        let platform = m.gateway().platform();
        let cancels = platform.cancels();
        assert_eq!(cancels.len(), 2);
        assert_eq!(cancels[0], cancels[1]);
        assert_eq!(platform.schedule_calls(), 2);
        assert_eq!(platform.pending.len(), BATCH_SIZE);
    }

    #[test]
    fn all_answered_still_cancels_but_never_schedules() {
        let mut m = manager(RecordingPlatform::granted());
        let mut rng = StdRng::seed_from_u64(3);
        let mut list = prayers(2);
        m.reschedule(&list, hourly(), Utc::now(), &mut rng).unwrap();
        for p in &mut list {
            p.mark_answered(Utc::now(), None);
        }
        let outcome = m.reschedule(&list, hourly(), Utc::now(), &mut rng).unwrap();

        assert_eq!(outcome, BatchOutcome::Empty);
        assert_eq!(m.batch_state(), &BatchState::Absent);
        let platform = m.gateway().platform();
        assert_eq!(platform.schedule_calls(), 1);
        assert_eq!(platform.cancels().len(), 2);
        assert_eq!(platform.cancels()[1], &ReminderId::batch_range());
        assert!(platform.pending.is_empty());
    }

    #[test]
    fn reschedule_without_permission_has_no_side_effects() {
        let mut m = manager(RecordingPlatform::denied());
        let mut rng = StdRng::seed_from_u64(4);
        let err = m.reschedule(&prayers(1), hourly(), Utc::now(), &mut rng);
        assert!(matches!(err, Err(ReminderError::PermissionDenied)));
        assert!(m.gateway().platform().calls.is_empty());
    }

    #[test]
    fn manual_reminder_in_the_past_is_rejected_before_the_gateway() {
        let mut m = manager(RecordingPlatform::granted());
        let now = Utc::now();
        let err = m.schedule_manual("p-1", "Exams", "", now - Duration::minutes(1), now);
        assert!(matches!(err, Err(ReminderError::InvalidSchedule { .. })));
        let err = m.schedule_manual("p-1", "Exams", "", now, now);
        assert!(matches!(err, Err(ReminderError::InvalidSchedule { .. })));
        assert!(m.gateway().platform().calls.is_empty());
    }

    #[test]
    fn manual_reminder_requires_permission() {
        let mut m = manager(RecordingPlatform::denied());
        let now = Utc::now();
        let err = m.schedule_manual("p-1", "Exams", "", now + Duration::hours(2), now);
        assert!(matches!(err, Err(ReminderError::PermissionDenied)));
        assert!(m.gateway().platform().calls.is_empty());
    }

    #[test]
    fn manual_reminder_is_keyed_by_prayer() {
        let mut m = manager(RecordingPlatform::granted());
        let now = Utc::now();
        let spec = m
            .schedule_manual("p-1", "Exams", "", now + Duration::hours(2), now)
            .unwrap();
        assert_eq!(spec.id, ReminderId::for_prayer("p-1"));
        assert_eq!(spec.title, "Prayer Reminder: Exams");
        assert!(!spec.payload.is_batch_reminder);

        // a second manual reminder for the same prayer replaces the first
        m.schedule_manual("p-1", "Exams", "", now + Duration::hours(3), now)
            .unwrap();
        assert_eq!(m.gateway().platform().pending.len(), 1);
    }

    #[test]
    fn answering_cancels_only_that_manual_reminder() {
        let mut m = manager(RecordingPlatform::granted());
        let mut rng = StdRng::seed_from_u64(5);
        let now = Utc::now();
        let mut list = prayers(2);
        let (a, b) = (list[0].id.clone(), list[1].id.clone());
        m.schedule_manual(&a, "a", "", now + Duration::hours(1), now).unwrap();
        m.schedule_manual(&b, "b", "", now + Duration::hours(1), now).unwrap();
        m.reschedule(&list, hourly(), now, &mut rng).unwrap();

        list[0].mark_answered(now, None);
        m.prayer_answered(&a, &list, hourly(), now, &mut rng).unwrap();

        let platform = m.gateway().platform();
        let cancels = platform.cancels();
        assert!(cancels.contains(&&vec![ReminderId::for_prayer(&a)]));
        assert!(!cancels.iter().any(|ids| ids.contains(&ReminderId::for_prayer(&b))));
        assert!(platform.pending.iter().any(|n| n.id == ReminderId::for_prayer(&b)));
        assert!(platform.pending.iter().all(|n| n.extra.prayer_id != a));
    }

    #[test]
    fn batch_operations_never_touch_manual_ids() {
        let mut m = manager(RecordingPlatform::granted());
        let mut rng = StdRng::seed_from_u64(6);
        let now = Utc::now();
        let list = prayers(1);
        m.schedule_manual(&list[0].id, "x", "", now + Duration::hours(5), now)
            .unwrap();
        m.reschedule(&list, hourly(), now, &mut rng).unwrap();
        m.clear_batch().unwrap();

        let pending = &m.gateway().platform().pending;
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].extra.is_scheduled_reminder);
    }

    #[test]
    fn gateway_failure_is_reported_and_batch_stays_absent() {
        let mut platform = RecordingPlatform::granted();
        platform.fail_writes = true;
        let mut m = manager(platform);
        let mut rng = StdRng::seed_from_u64(7);
        let err = m.reschedule(&prayers(1), hourly(), Utc::now(), &mut rng);
        assert!(matches!(err, Err(ReminderError::GatewayFailure(_))));
        assert_eq!(m.batch_state(), &BatchState::Absent);
        // no retry
        assert_eq!(m.gateway().platform().calls.len(), 1);
    }

    #[test]
    fn failed_manual_cancel_still_replans_the_batch() {
        let mut m = manager(RecordingPlatform::granted());
        let mut rng = StdRng::seed_from_u64(12);
        let now = Utc::now();
        let mut list = prayers(2);
        let (a, b) = (list[0].id.clone(), list[1].id.clone());
        m.reschedule(&list, hourly(), now, &mut rng).unwrap();

        list[0].mark_answered(now, None);
        m.gateway_mut().platform_mut().refused.push(ReminderId::for_prayer(&a));
        let result = m.prayer_answered(&a, &list, hourly(), now, &mut rng);

        assert!(matches!(result, Err(ReminderError::GatewayFailure(_))));
        let pending = &m.gateway().platform().pending;
        assert_eq!(pending.len(), BATCH_SIZE);
        assert!(pending.iter().all(|n| n.extra.prayer_id == b));
        assert!(matches!(m.batch_state(), BatchState::Present { .. }));
    }

    #[test]
    fn denied_permission_is_still_a_completed_request() {
        let mut m = manager(RecordingPlatform::denied());
        m.gateway_mut().initialize();
        assert!(m.gateway().is_initialized());
        assert_eq!(m.gateway().check_permission(), PermissionState::Denied);
    }
}
