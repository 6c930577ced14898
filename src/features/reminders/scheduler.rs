//! # Reminder Scheduler
//!
//! Polls the wall clock on a short fixed interval and fires each quarter-hour slot
//! once: due reminders are sent, then counted.
//!
//! Ordering is send-then-increment. A failed or timed-out send never advances a
//! course, so the dose is retried at the reminder's next slot. The cost is that a
//! crash between a successful send and its increment re-delivers without counting
//! that dose.
//!
//! Deliveries within a slot run concurrently, each bounded by the delivery
//! timeout, so a stalled platform costs one timeout per batch rather than one per
//! recipient.
//!
//! - **Version**: 2.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.1.0: Concurrent delivery within a slot under a batch deadline
//! - 2.0.0: Quarter-hour slot scheduling with per-slot dedupe and shutdown handle
//! - 1.0.0: Initial release with one-shot timestamp reminders

use chrono::{FixedOffset, Timelike, Utc};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{timeout, timeout_at, Instant, MissedTickBehavior};

use super::engine::{congratulation_text, delivery_text, ReminderEngine};
use super::model::{ChatId, Reminder, Slot, QUARTER_MARKS};
use crate::core::offset_label;
use crate::notifier::Notifier;

/// Deliveries in flight at once within one slot
const MAX_CONCURRENT_DELIVERIES: usize = 32;
/// A slot's batch must finish well before the next quarter-hour mark
const BATCH_DEADLINE: Duration = Duration::from_secs(10 * 60);

/// Remembers the last slot that fired so one slot never fires twice
#[derive(Debug, Default)]
pub struct SlotTracker {
    last_fired: Option<Slot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotCheck {
    /// Not a quarter-hour mark; the marker was cleared
    OffSlot,
    AlreadyFired,
    Fresh(Slot),
}

impl SlotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, hour: u8, minute: u8) -> SlotCheck {
        if !QUARTER_MARKS.contains(&minute) {
            self.last_fired = None;
            return SlotCheck::OffSlot;
        }
        match Slot::new(hour, minute) {
            Some(slot) if self.last_fired == Some(slot) => SlotCheck::AlreadyFired,
            Some(slot) => SlotCheck::Fresh(slot),
            None => {
                self.last_fired = None;
                SlotCheck::OffSlot
            }
        }
    }

    pub fn mark_fired(&mut self, slot: Slot) {
        self.last_fired = Some(slot);
    }

    pub fn last_fired(&self) -> Option<Slot> {
        self.last_fired
    }
}

/// Counts for one fired slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    pub counted: usize,
    pub completed: usize,
}

impl DeliveryReport {
    fn absorb(&mut self, other: &DeliveryReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.counted += other.counted;
        self.completed += other.completed;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    OffSlot,
    AlreadyFired,
    /// Nothing due; the slot stays open so a reminder added late is still caught
    NothingDue,
    /// The due query failed; retried on the next poll within the slot
    QueryFailed,
    Delivered(DeliveryReport),
}

pub struct ReminderScheduler {
    engine: ReminderEngine,
    notifier: Arc<dyn Notifier>,
    timezone: FixedOffset,
    poll_interval: Duration,
    delivery_timeout: Duration,
    tracker: SlotTracker,
}

/// Running scheduler task
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop polling; a tick in progress finishes first
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Scheduler task ended abnormally: {e}");
        }
    }
}

impl ReminderScheduler {
    pub fn new(
        engine: ReminderEngine,
        notifier: Arc<dyn Notifier>,
        timezone: FixedOffset,
        poll_interval: Duration,
        delivery_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            notifier,
            timezone,
            poll_interval,
            delivery_timeout,
            tracker: SlotTracker::new(),
        }
    }

    /// Current hour and minute in the configured zone
    fn local_time(&self) -> (u8, u8) {
        let now = Utc::now().with_timezone(&self.timezone);
        (now.hour() as u8, now.minute() as u8)
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SchedulerHandle { shutdown: tx, task }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "⏰ Reminder scheduler started (poll every {:?}, {}, counting on {})",
            self.poll_interval,
            offset_label(&self.timezone),
            self.engine.counting_mode()
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let (hour, minute) = self.local_time();
                    self.tick(hour, minute).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("⏰ Reminder scheduler stopped");
                        break;
                    }
                }
            }
        }
    }

    /// One poll at local time `hour:minute`
    pub async fn tick(&mut self, hour: u8, minute: u8) -> TickOutcome {
        let slot = match self.tracker.observe(hour, minute) {
            SlotCheck::OffSlot => return TickOutcome::OffSlot,
            SlotCheck::AlreadyFired => return TickOutcome::AlreadyFired,
            SlotCheck::Fresh(slot) => slot,
        };

        let due = match timeout(self.delivery_timeout, self.engine.due_reminders(slot)).await {
            Ok(Ok(due)) => due,
            Ok(Err(e)) => {
                error!("Failed to load reminders due at {slot}: {e}");
                return TickOutcome::QueryFailed;
            }
            Err(_) => {
                error!("Loading reminders due at {slot} timed out");
                return TickOutcome::QueryFailed;
            }
        };

        if due.is_empty() {
            debug!("Nothing due at {slot}");
            return TickOutcome::NothingDue;
        }

        self.tracker.mark_fired(slot);
        info!("📨 Sending reminders at {} to {} users", slot, due.len());

        let report = self.deliver_batch(due).await;

        info!(
            "📨 Slot {} done: {} delivered, {} failed, {} counted, {} completed",
            slot, report.delivered, report.failed, report.counted, report.completed
        );
        TickOutcome::Delivered(report)
    }

    /// Deliver every due pair concurrently, bounded by [`MAX_CONCURRENT_DELIVERIES`]
    ///
    /// Pairs still running at [`BATCH_DEADLINE`] are aborted and reported as failed.
    async fn deliver_batch(&self, due: BTreeMap<ChatId, Vec<Reminder>>) -> DeliveryReport {
        let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_DELIVERIES));
        let mut deliveries = JoinSet::new();

        for (chat_id, reminders) in due {
            for reminder in reminders {
                let engine = self.engine.clone();
                let notifier = Arc::clone(&self.notifier);
                let permits = Arc::clone(&permits);
                let delivery_timeout = self.delivery_timeout;
                deliveries.spawn(async move {
                    // The semaphore is never closed
                    let _permit = permits.acquire_owned().await.ok();
                    deliver(&engine, notifier.as_ref(), delivery_timeout, chat_id, &reminder).await
                });
            }
        }

        let mut report = DeliveryReport::default();
        let deadline = Instant::now() + BATCH_DEADLINE;
        loop {
            match timeout_at(deadline, deliveries.join_next()).await {
                Ok(Some(Ok(pair))) => report.absorb(&pair),
                Ok(Some(Err(e))) => {
                    error!("Delivery task failed: {e}");
                    report.failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    let stuck = deliveries.len();
                    error!("Delivery batch passed its deadline, abandoning {stuck} deliveries");
                    deliveries.abort_all();
                    report.failed += stuck;
                    break;
                }
            }
        }
        report
    }
}

/// Send one reminder, then count it when the engine counts on delivery
async fn deliver(
    engine: &ReminderEngine,
    notifier: &dyn Notifier,
    delivery_timeout: Duration,
    chat_id: ChatId,
    reminder: &Reminder,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    let text = delivery_text(reminder);
    let send = notifier.send_with_ack_control(chat_id, &text, reminder.id);
    match timeout(delivery_timeout, send).await {
        Ok(Ok(_)) => report.delivered += 1,
        Ok(Err(e)) => {
            warn!("Failed to deliver reminder {} to {}: {}", reminder.id, chat_id, e);
            report.failed += 1;
            return report;
        }
        Err(_) => {
            warn!("Delivery of reminder {} to {} timed out", reminder.id, chat_id);
            report.failed += 1;
            return report;
        }
    }

    if !engine.counts_on_delivery() {
        return report;
    }

    let outcome = match timeout(delivery_timeout, engine.increment_dose(chat_id, reminder.id)).await
    {
        Ok(Ok(Some(outcome))) => outcome,
        Ok(Ok(None)) => {
            debug!("Reminder {} was removed before it could be counted", reminder.id);
            return report;
        }
        Ok(Err(e)) => {
            error!("Failed to count dose for reminder {}: {}", reminder.id, e);
            return report;
        }
        Err(_) => {
            error!("Counting dose for reminder {} timed out", reminder.id);
            return report;
        }
    };

    report.counted += 1;
    if outcome.completed {
        report.completed += 1;
        let congrats_text = congratulation_text(&outcome.medicine);
        match timeout(delivery_timeout, notifier.send_text(chat_id, &congrats_text)).await {
            Ok(Ok(_)) => info!("🎉 Course {} completed for {}", outcome.medicine, chat_id),
            Ok(Err(e)) => warn!("Failed to congratulate {}: {}", chat_id, e),
            Err(_) => warn!("Congratulating {} timed out", chat_id),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::features::reminders::model::{CountingMode, NewReminder};
    use crate::features::reminders::repository::ReminderRepository;
    use crate::notifier::recording::RecordingNotifier;

    struct Fixture {
        db: Arc<Database>,
        notifier: Arc<RecordingNotifier>,
        scheduler: ReminderScheduler,
    }

    async fn fixture(counting: CountingMode, delivery_timeout: Duration) -> Fixture {
        let db = Arc::new(Database::new(":memory:").await.unwrap());
        let notifier = Arc::new(RecordingNotifier::new());
        let scheduler = ReminderScheduler::new(
            ReminderEngine::new(db.clone(), counting),
            notifier.clone(),
            FixedOffset::east_opt(5 * 3600).unwrap(),
            Duration::from_millis(10),
            delivery_timeout,
        );
        Fixture {
            db,
            notifier,
            scheduler,
        }
    }

    fn at_9_15(medicine: &str, course_days: u32) -> NewReminder {
        NewReminder {
            medicine: medicine.to_string(),
            hour: 9,
            minute: 15,
            course_days,
        }
    }

    #[test]
    fn test_slot_tracker() {
        let mut tracker = SlotTracker::new();
        let slot = match tracker.observe(9, 15) {
            SlotCheck::Fresh(slot) => slot,
            other => panic!("unexpected {other:?}"),
        };
        tracker.mark_fired(slot);
        assert_eq!(tracker.observe(9, 15), SlotCheck::AlreadyFired);
        assert_eq!(tracker.observe(9, 16), SlotCheck::OffSlot);
        assert_eq!(tracker.last_fired(), None);
        assert!(matches!(tracker.observe(9, 30), SlotCheck::Fresh(_)));
    }

    #[tokio::test]
    async fn test_only_active_users_are_delivered_and_counted() {
        let mut f = fixture(CountingMode::Delivery, Duration::from_secs(1)).await;
        let a = f.db.add_reminder(1, &at_9_15("Aspirin", 7)).await.unwrap();
        f.db.add_reminder(2, &at_9_15("Iron", 0)).await.unwrap();
        f.db.add_reminder(3, &at_9_15("Paused", 7)).await.unwrap();
        f.db.set_active(3, false).await.unwrap();

        let outcome = f.scheduler.tick(9, 15).await;
        assert_eq!(
            outcome,
            TickOutcome::Delivered(DeliveryReport {
                delivered: 2,
                failed: 0,
                counted: 2,
                completed: 0,
            })
        );

        assert_eq!(f.notifier.sent_texts(1), vec!["⏰ Time to take: 💊 Aspirin"]);
        assert_eq!(f.notifier.sent_texts(2), vec!["⏰ Time to take: 💊 Iron"]);
        assert!(f.notifier.sent_texts(3).is_empty());

        assert_eq!(f.db.list_reminders(1).await.unwrap()[0].doses_taken, 1);
        assert_eq!(f.db.list_reminders(2).await.unwrap()[0].doses_taken, 1);
        assert_eq!(f.db.list_reminders(3).await.unwrap()[0].doses_taken, 0);

        let (_, _, controls) = f.notifier.last_sent(1).unwrap();
        assert_eq!(
            controls.unwrap().actions(),
            vec![crate::message_components::ComponentAction::Taken(a)]
        );
    }

    #[tokio::test]
    async fn test_same_slot_fires_once() {
        let mut f = fixture(CountingMode::Delivery, Duration::from_secs(1)).await;
        f.db.add_reminder(1, &at_9_15("Aspirin", 7)).await.unwrap();

        assert!(matches!(f.scheduler.tick(9, 15).await, TickOutcome::Delivered(_)));
        assert_eq!(f.scheduler.tick(9, 15).await, TickOutcome::AlreadyFired);

        assert_eq!(f.notifier.sent_texts(1).len(), 1);
        assert_eq!(f.db.list_reminders(1).await.unwrap()[0].doses_taken, 1);
    }

    #[tokio::test]
    async fn test_empty_slot_stays_open() {
        let mut f = fixture(CountingMode::Delivery, Duration::from_secs(1)).await;

        assert_eq!(f.scheduler.tick(9, 15).await, TickOutcome::NothingDue);
        f.db.add_reminder(1, &at_9_15("Late", 0)).await.unwrap();
        assert!(matches!(f.scheduler.tick(9, 15).await, TickOutcome::Delivered(_)));
        assert_eq!(f.scheduler.tick(9, 17).await, TickOutcome::OffSlot);
    }

    #[tokio::test]
    async fn test_failed_send_does_not_count() {
        let mut f = fixture(CountingMode::Delivery, Duration::from_secs(1)).await;
        f.db.add_reminder(1, &at_9_15("Aspirin", 7)).await.unwrap();
        f.db.add_reminder(2, &at_9_15("Iron", 7)).await.unwrap();
        f.notifier.fail_for(1);

        match f.scheduler.tick(9, 15).await {
            TickOutcome::Delivered(report) => {
                assert_eq!(report.failed, 1);
                assert_eq!(report.delivered, 1);
                assert_eq!(report.counted, 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(f.db.list_reminders(1).await.unwrap()[0].doses_taken, 0);
        assert_eq!(f.db.list_reminders(2).await.unwrap()[0].doses_taken, 1);
    }

    #[tokio::test]
    async fn test_hanging_send_is_bounded() {
        let mut f = fixture(CountingMode::Delivery, Duration::from_millis(50)).await;
        f.db.add_reminder(1, &at_9_15("Aspirin", 7)).await.unwrap();
        f.db.add_reminder(2, &at_9_15("Iron", 7)).await.unwrap();
        f.notifier.hang_for(1);

        let outcome = timeout(Duration::from_secs(2), f.scheduler.tick(9, 15))
            .await
            .expect("tick must not hang on one recipient");
        match outcome {
            TickOutcome::Delivered(report) => {
                assert_eq!(report.failed, 1);
                assert_eq!(report.delivered, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.db.list_reminders(1).await.unwrap()[0].doses_taken, 0);
    }

    #[tokio::test]
    async fn test_many_hanging_recipients_cost_one_timeout() {
        let mut f = fixture(CountingMode::Delivery, Duration::from_millis(100)).await;
        for chat_id in 1..=20 {
            f.db.add_reminder(chat_id, &at_9_15("Aspirin", 7)).await.unwrap();
            f.notifier.hang_for(chat_id);
        }
        f.db.add_reminder(21, &at_9_15("Iron", 7)).await.unwrap();

        let started = std::time::Instant::now();
        let outcome = f.scheduler.tick(9, 15).await;
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(1), "tick took {elapsed:?}");
        match outcome {
            TickOutcome::Delivered(report) => {
                assert_eq!(report.failed, 20);
                assert_eq!(report.delivered, 1);
                assert_eq!(report.counted, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.db.list_reminders(21).await.unwrap()[0].doses_taken, 1);
        assert_eq!(f.db.list_reminders(1).await.unwrap()[0].doses_taken, 0);
    }

    #[tokio::test]
    async fn test_completion_sends_congratulation_after_reminder() {
        let mut f = fixture(CountingMode::Delivery, Duration::from_secs(1)).await;
        f.db.add_reminder(1, &at_9_15("Aspirin", 1)).await.unwrap();

        match f.scheduler.tick(9, 15).await {
            TickOutcome::Delivered(report) => assert_eq!(report.completed, 1),
            other => panic!("unexpected {other:?}"),
        }

        let texts = f.notifier.sent_texts(1);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "⏰ Time to take: 💊 Aspirin");
        assert_eq!(texts[1], congratulation_text("Aspirin"));
        assert!(f.db.list_reminders(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acknowledgement_mode_only_sends() {
        let mut f = fixture(CountingMode::Acknowledgement, Duration::from_secs(1)).await;
        f.db.add_reminder(1, &at_9_15("Aspirin", 7)).await.unwrap();

        match f.scheduler.tick(9, 15).await {
            TickOutcome::Delivered(report) => {
                assert_eq!(report.delivered, 1);
                assert_eq!(report.counted, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.db.list_reminders(1).await.unwrap()[0].doses_taken, 0);
    }

    #[tokio::test]
    async fn test_spawned_scheduler_shuts_down() {
        let f = fixture(CountingMode::Delivery, Duration::from_secs(1)).await;
        let handle = f.scheduler.spawn();
        tokio::time::sleep(Duration::from_millis(30)).await;
        timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("scheduler should stop promptly");
    }
}
