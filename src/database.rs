//! # SQLite persistence
//!
//! Users and their reminders, stored through the `sqlite` crate behind a single
//! mutex-guarded connection. Implements [`ReminderRepository`] for the rest of the bot.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Dose increment and completion delete share one transaction
//! - 1.0.0: Initial schema with users and reminders

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use log::{debug, info};
use sqlite::{Connection, State, Statement};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::features::reminders::model::{
    ChatId, DoseOutcome, NewReminder, Reminder, ReminderId, Stats, User,
};
use crate::features::reminders::repository::ReminderRepository;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        chat_id INTEGER PRIMARY KEY,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS reminders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id INTEGER NOT NULL REFERENCES users(chat_id) ON DELETE CASCADE,
        medicine TEXT NOT NULL,
        hour INTEGER NOT NULL,
        minute INTEGER NOT NULL,
        course_days INTEGER NOT NULL DEFAULT 0,
        doses_taken INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_reminders_chat_id ON reminders(chat_id);
    CREATE INDEX IF NOT EXISTS idx_reminders_time ON reminders(hour, minute);
";

const REMINDER_COLUMNS: &str = "id, medicine, hour, minute, course_days, doses_taken";

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path`; `:memory:` gives a private in-memory store
    pub async fn new(path: &str) -> Result<Self> {
        let conn = sqlite::open(path).with_context(|| format!("failed to open database {path}"))?;
        conn.execute(SCHEMA).context("failed to create tables")?;
        info!("💾 Database ready at {path}");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection mutex poisoned"))
    }

    fn ensure_user(conn: &Connection, chat_id: ChatId) -> Result<()> {
        let mut stmt = conn.prepare("INSERT OR IGNORE INTO users (chat_id, active) VALUES (?, 1)")?;
        stmt.bind((1, chat_id))?;
        stmt.next()?;
        Ok(())
    }

    fn read_reminder(stmt: &Statement<'_>) -> Result<Reminder> {
        Ok(Reminder {
            id: stmt.read::<i64, _>("id")?,
            medicine: stmt.read::<String, _>("medicine")?,
            hour: stmt.read::<i64, _>("hour")? as u8,
            minute: stmt.read::<i64, _>("minute")? as u8,
            course_days: stmt.read::<i64, _>("course_days")? as u32,
            doses_taken: stmt.read::<i64, _>("doses_taken")? as u32,
        })
    }

    fn reminders_for(conn: &Connection, chat_id: ChatId) -> Result<Vec<Reminder>> {
        let mut stmt = conn.prepare(format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders WHERE chat_id = ? ORDER BY hour, minute, id"
        ))?;
        stmt.bind((1, chat_id))?;

        let mut reminders = Vec::new();
        while let State::Row = stmt.next()? {
            reminders.push(Self::read_reminder(&stmt)?);
        }
        Ok(reminders)
    }

    /// Run `f` inside an immediate transaction, rolling back on error
    fn in_transaction<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        conn.execute("BEGIN IMMEDIATE")?;
        match f(conn) {
            Ok(value) => {
                conn.execute("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = conn.execute("ROLLBACK") {
                    log::error!("Rollback failed after {e}: {rollback}");
                }
                Err(e)
            }
        }
    }

    fn count(conn: &Connection, query: &str) -> Result<u64> {
        let mut stmt = conn.prepare(query)?;
        match stmt.next()? {
            State::Row => Ok(stmt.read::<i64, _>(0)?.max(0) as u64),
            State::Done => Ok(0),
        }
    }
}

#[async_trait]
impl ReminderRepository for Database {
    async fn get_or_create_user(&self, chat_id: ChatId) -> Result<User> {
        let conn = self.lock()?;
        Self::ensure_user(&conn, chat_id)?;

        let mut stmt = conn.prepare("SELECT active FROM users WHERE chat_id = ?")?;
        stmt.bind((1, chat_id))?;
        let active = match stmt.next()? {
            State::Row => stmt.read::<i64, _>("active")? != 0,
            State::Done => anyhow::bail!("user {chat_id} vanished after insert"),
        };
        drop(stmt);

        Ok(User {
            chat_id,
            active,
            reminders: Self::reminders_for(&conn, chat_id)?,
        })
    }

    async fn set_active(&self, chat_id: ChatId, active: bool) -> Result<()> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "INSERT INTO users (chat_id, active) VALUES (?, ?)
             ON CONFLICT(chat_id) DO UPDATE SET active = excluded.active",
        )?;
        stmt.bind((1, chat_id))?;
        stmt.bind((2, active as i64))?;
        stmt.next()?;
        debug!("User {chat_id} active = {active}");
        Ok(())
    }

    async fn list_reminders(&self, chat_id: ChatId) -> Result<Vec<Reminder>> {
        let conn = self.lock()?;
        Self::reminders_for(&conn, chat_id)
    }

    async fn add_reminder(&self, chat_id: ChatId, reminder: &NewReminder) -> Result<ReminderId> {
        let conn = self.lock()?;
        Self::in_transaction(&conn, |conn| {
            Self::ensure_user(conn, chat_id)?;

            let mut stmt = conn.prepare(
                "INSERT INTO reminders (chat_id, medicine, hour, minute, course_days, doses_taken)
                 VALUES (?, ?, ?, ?, ?, 0)",
            )?;
            stmt.bind((1, chat_id))?;
            stmt.bind((2, reminder.medicine.as_str()))?;
            stmt.bind((3, reminder.hour as i64))?;
            stmt.bind((4, reminder.minute as i64))?;
            stmt.bind((5, reminder.course_days as i64))?;
            stmt.next()?;
            drop(stmt);

            let mut id_stmt = conn.prepare("SELECT last_insert_rowid()")?;
            match id_stmt.next()? {
                State::Row => Ok(id_stmt.read::<i64, _>(0)?),
                State::Done => anyhow::bail!("insert did not report a row id"),
            }
        })
    }

    async fn delete_reminder(&self, chat_id: ChatId, reminder_id: ReminderId) -> Result<bool> {
        let conn = self.lock()?;
        Self::in_transaction(&conn, |conn| {
            let mut exists = conn.prepare("SELECT 1 FROM reminders WHERE id = ? AND chat_id = ?")?;
            exists.bind((1, reminder_id))?;
            exists.bind((2, chat_id))?;
            if let State::Done = exists.next()? {
                return Ok(false);
            }
            drop(exists);

            let mut stmt = conn.prepare("DELETE FROM reminders WHERE id = ? AND chat_id = ?")?;
            stmt.bind((1, reminder_id))?;
            stmt.bind((2, chat_id))?;
            stmt.next()?;
            Ok(true)
        })
    }

    async fn due_reminders(&self, hour: u8, minute: u8) -> Result<BTreeMap<ChatId, Vec<Reminder>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT r.chat_id, r.id, r.medicine, r.hour, r.minute, r.course_days, r.doses_taken
             FROM reminders r
             JOIN users u ON r.chat_id = u.chat_id
             WHERE r.hour = ? AND r.minute = ?
               AND u.active = 1
               AND (r.course_days = 0 OR r.doses_taken < r.course_days)
             ORDER BY r.chat_id, r.id",
        )?;
        stmt.bind((1, hour as i64))?;
        stmt.bind((2, minute as i64))?;

        let mut due: BTreeMap<ChatId, Vec<Reminder>> = BTreeMap::new();
        while let State::Row = stmt.next()? {
            let chat_id = stmt.read::<i64, _>("chat_id")?;
            due.entry(chat_id).or_default().push(Self::read_reminder(&stmt)?);
        }
        Ok(due)
    }

    async fn increment_dose(
        &self,
        chat_id: ChatId,
        reminder_id: ReminderId,
    ) -> Result<Option<DoseOutcome>> {
        let conn = self.lock()?;
        Self::in_transaction(&conn, |conn| {
            let mut stmt = conn.prepare(
                "SELECT medicine, course_days, doses_taken FROM reminders WHERE id = ? AND chat_id = ?",
            )?;
            stmt.bind((1, reminder_id))?;
            stmt.bind((2, chat_id))?;
            let (medicine, total, taken) = match stmt.next()? {
                State::Row => (
                    stmt.read::<String, _>("medicine")?,
                    stmt.read::<i64, _>("course_days")? as u32,
                    stmt.read::<i64, _>("doses_taken")? as u32,
                ),
                State::Done => return Ok(None),
            };
            drop(stmt);

            let count = taken + 1;
            let completed = total > 0 && count >= total;

            if completed {
                let mut delete = conn.prepare("DELETE FROM reminders WHERE id = ? AND chat_id = ?")?;
                delete.bind((1, reminder_id))?;
                delete.bind((2, chat_id))?;
                delete.next()?;
                info!("🎉 Course of {medicine} complete for {chat_id}, reminder {reminder_id} removed");
            } else {
                let mut update = conn.prepare(
                    "UPDATE reminders SET doses_taken = ? WHERE id = ? AND chat_id = ?",
                )?;
                update.bind((1, count as i64))?;
                update.bind((2, reminder_id))?;
                update.bind((3, chat_id))?;
                update.next()?;
            }

            Ok(Some(DoseOutcome {
                medicine,
                count,
                total,
                completed,
            }))
        })
    }

    async fn stats(&self) -> Result<Stats> {
        let conn = self.lock()?;
        Ok(Stats {
            total_users: Self::count(&conn, "SELECT COUNT(*) FROM users")?,
            active_users: Self::count(&conn, "SELECT COUNT(*) FROM users WHERE active = 1")?,
            total_reminders: Self::count(&conn, "SELECT COUNT(*) FROM reminders")?,
            finite_courses: Self::count(&conn, "SELECT COUNT(*) FROM reminders WHERE course_days > 0")?,
            unbounded_courses: Self::count(&conn, "SELECT COUNT(*) FROM reminders WHERE course_days = 0")?,
            doses_taken: Self::count(&conn, "SELECT COALESCE(SUM(doses_taken), 0) FROM reminders")?,
            doses_planned: Self::count(
                &conn,
                "SELECT COALESCE(SUM(course_days), 0) FROM reminders WHERE course_days > 0",
            )?,
        })
    }

    async fn list_user_ids(&self) -> Result<Vec<ChatId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT chat_id FROM users ORDER BY chat_id")?;
        let mut ids = Vec::new();
        while let State::Row = stmt.next()? {
            ids.push(stmt.read::<i64, _>(0)?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(medicine: &str, hour: u8, minute: u8, course_days: u32) -> NewReminder {
        NewReminder {
            medicine: medicine.to_string(),
            hour,
            minute,
            course_days,
        }
    }

    async fn memory_db() -> Database {
        Database::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_or_create_user_is_idempotent() {
        let db = memory_db().await;
        let user = db.get_or_create_user(42).await.unwrap();
        assert!(user.active);
        assert!(user.reminders.is_empty());

        db.set_active(42, false).await.unwrap();
        let again = db.get_or_create_user(42).await.unwrap();
        assert!(!again.active);
        assert_eq!(db.list_user_ids().await.unwrap(), vec![42]);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_time() {
        let db = memory_db().await;
        db.add_reminder(1, &draft("Evening", 21, 0, 0)).await.unwrap();
        db.add_reminder(1, &draft("Morning", 8, 30, 7)).await.unwrap();
        db.add_reminder(1, &draft("Noon", 12, 0, 14)).await.unwrap();

        let names: Vec<String> = db
            .list_reminders(1)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.medicine)
            .collect();
        assert_eq!(names, vec!["Morning", "Noon", "Evening"]);
    }

    #[tokio::test]
    async fn test_delete_only_own_reminder() {
        let db = memory_db().await;
        let id = db.add_reminder(1, &draft("Aspirin", 9, 15, 7)).await.unwrap();

        assert!(!db.delete_reminder(2, id).await.unwrap());
        assert_eq!(db.list_reminders(1).await.unwrap().len(), 1);

        assert!(db.delete_reminder(1, id).await.unwrap());
        assert!(db.list_reminders(1).await.unwrap().is_empty());
        assert!(!db.delete_reminder(1, id).await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_dose_completes_and_removes() {
        let db = memory_db().await;
        let id = db.add_reminder(1, &draft("Aspirin", 9, 15, 2)).await.unwrap();

        let first = db.increment_dose(1, id).await.unwrap().unwrap();
        assert_eq!(first.count, 1);
        assert_eq!(first.total, 2);
        assert!(!first.completed);

        let last = db.increment_dose(1, id).await.unwrap().unwrap();
        assert_eq!(last.count, 2);
        assert!(last.completed);
        assert_eq!(last.medicine, "Aspirin");

        assert!(db.list_reminders(1).await.unwrap().is_empty());
        assert_eq!(db.increment_dose(1, id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_increment_unbounded_never_completes() {
        let db = memory_db().await;
        let id = db.add_reminder(1, &draft("Vitamin D", 8, 0, 0)).await.unwrap();
        for _ in 0..5 {
            let outcome = db.increment_dose(1, id).await.unwrap().unwrap();
            assert!(!outcome.completed);
        }
        let reminders = db.list_reminders(1).await.unwrap();
        assert_eq!(reminders[0].doses_taken, 5);
        assert_eq!(reminders[0].progress_label(), "5/∞");
    }

    #[tokio::test]
    async fn test_increment_wrong_owner_is_none() {
        let db = memory_db().await;
        let id = db.add_reminder(1, &draft("Aspirin", 9, 15, 7)).await.unwrap();
        assert_eq!(db.increment_dose(2, id).await.unwrap(), None);
        assert_eq!(db.list_reminders(1).await.unwrap()[0].doses_taken, 0);
    }

    #[tokio::test]
    async fn test_due_reminders_skip_inactive_users() {
        let db = memory_db().await;
        db.add_reminder(1, &draft("A", 9, 15, 7)).await.unwrap();
        db.add_reminder(2, &draft("B", 9, 15, 0)).await.unwrap();
        db.add_reminder(3, &draft("C", 9, 15, 7)).await.unwrap();
        db.add_reminder(1, &draft("Later", 10, 0, 7)).await.unwrap();
        db.set_active(3, false).await.unwrap();

        let due = db.due_reminders(9, 15).await.unwrap();
        assert_eq!(due.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(due[&1].len(), 1);
        assert_eq!(due[&1][0].medicine, "A");
    }

    #[tokio::test]
    async fn test_stats_aggregates() {
        let db = memory_db().await;
        let id = db.add_reminder(1, &draft("A", 9, 15, 7)).await.unwrap();
        db.add_reminder(2, &draft("B", 9, 15, 0)).await.unwrap();
        db.set_active(2, false).await.unwrap();
        db.increment_dose(1, id).await.unwrap();

        let stats = db.stats().await.unwrap();
        assert_eq!(
            stats,
            Stats {
                total_users: 2,
                active_users: 1,
                total_reminders: 2,
                finite_courses: 1,
                unbounded_courses: 1,
                doses_taken: 1,
                doses_planned: 7,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_complete_once() {
        let db = Arc::new(memory_db().await);
        let id = db.add_reminder(1, &draft("Aspirin", 9, 15, 3)).await.unwrap();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.increment_dose(1, id).await.unwrap() })
            })
            .collect();

        let mut counted = Vec::new();
        for task in tasks {
            if let Some(outcome) = task.await.unwrap() {
                counted.push(outcome);
            }
        }

        assert_eq!(counted.len(), 3);
        assert_eq!(counted.iter().filter(|o| o.completed).count(), 1);
        let mut counts: Vec<u32> = counted.iter().map(|o| o.count).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2, 3]);
        assert!(db.list_reminders(1).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delete_racing_increments_stays_deleted() {
        let db = Arc::new(memory_db().await);
        let id = db.add_reminder(1, &draft("Vitamin D", 8, 0, 0)).await.unwrap();

        let increments: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move { db.increment_dose(1, id).await.unwrap() })
            })
            .collect();
        let delete = {
            let db = db.clone();
            tokio::spawn(async move { db.delete_reminder(1, id).await.unwrap() })
        };

        assert!(delete.await.unwrap());
        let mut counts = Vec::new();
        for task in increments {
            if let Some(outcome) = task.await.unwrap() {
                assert!(!outcome.completed);
                counts.push(outcome.count);
            }
        }
        counts.sort_unstable();
        let expected: Vec<u32> = (1..=counts.len() as u32).collect();
        assert_eq!(counts, expected);

        assert!(db.list_reminders(1).await.unwrap().is_empty());
        assert_eq!(db.increment_dose(1, id).await.unwrap(), None);
        assert_eq!(db.stats().await.unwrap().total_reminders, 0);
    }
}
