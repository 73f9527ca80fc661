// ==========================================
// 车辆合规管理系统 - 站内通知仓储
// ==========================================
// 职责: notifications 表读写；作为默认 NotificationDispatcher（落库即投递）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::notification::Notification;
use crate::domain::types::NotificationCategory;
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::notifier::{DispatchError, NotificationDispatcher};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub struct NotificationRepository {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl NotificationRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(SystemClock),
        })
    }

    /// 从已有连接创建（created_at 取自 clock）
    pub fn from_connection(conn: Arc<Mutex<Connection>>, clock: Arc<dyn Clock>) -> Self {
        Self { conn, clock }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, notification: &Notification) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO notifications (
                notification_id, user_id, title, message, category, is_read, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                notification.notification_id,
                notification.user_id,
                notification.title,
                notification.message,
                notification.category.to_db_str(),
                notification.is_read,
                notification.created_at,
            ],
        )?;
        Ok(())
    }

    /// 用户通知（最新在前）
    pub fn list_for_user(&self, user_id: &str, unread_only: bool) -> RepositoryResult<Vec<Notification>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT notification_id, user_id, title, message, category, is_read, created_at
            FROM notifications
            WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;
        let notifications = stmt
            .query_map(params![user_id, unread_only], map_notification_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    /// 标记已读，返回是否存在
    pub fn mark_read(&self, notification_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE notifications SET is_read = 1 WHERE notification_id = ?1",
            params![notification_id],
        )?;
        Ok(affected > 0)
    }

    pub fn count_unread(&self, user_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

impl NotificationDispatcher for NotificationRepository {
    fn notify(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        category: NotificationCategory,
    ) -> Result<(), DispatchError> {
        if user_id.trim().is_empty() {
            return Err(DispatchError::Rejected("接收人为空".to_string()));
        }

        let notification = Notification {
            notification_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            category,
            is_read: false,
            created_at: self.clock.now(),
        };
        self.insert(&notification)?;
        Ok(())
    }
}

fn map_notification_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        notification_id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        message: row.get(3)?,
        category: NotificationCategory::from_str(&row.get::<_, String>(4)?),
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::engine::clock::ManualClock;
    use chrono::NaiveDate;

    fn repo() -> NotificationRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let clock = ManualClock::new(
            NaiveDate::from_ymd_opt(2026, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        );
        NotificationRepository::from_connection(Arc::new(Mutex::new(conn)), Arc::new(clock))
    }

    #[test]
    fn test_dispatch_persists_unread() {
        let repo = repo();
        repo.notify("U1", "title", "body", NotificationCategory::ComplianceExpiry)
            .unwrap();
        repo.notify("U1", "t2", "b2", NotificationCategory::System).unwrap();

        assert_eq!(repo.count_unread("U1").unwrap(), 2);
        let list = repo.list_for_user("U1", false).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "t2");

        assert!(repo.mark_read(&list[0].notification_id).unwrap());
        assert_eq!(repo.list_for_user("U1", true).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_recipient_rejected() {
        let repo = repo();
        let err = repo
            .notify(" ", "t", "m", NotificationCategory::System)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(_)));
    }
}
