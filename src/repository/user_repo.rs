// ==========================================
// 车辆合规管理系统 - 用户仓储
// ==========================================
// 职责: users 表读写；作为 IdentityProvider 的 SQLite 实现
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::UserRole;
use crate::domain::user::{Actor, User};
use crate::engine::collaborators::IdentityProvider;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建用户
    ///
    /// # 错误
    /// - UniqueConstraintViolation: user_id 已存在
    pub fn create_user(&self, user: &User) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO users (user_id, display_name, email, role) VALUES (?1, ?2, ?3, ?4)",
            params![user.user_id, user.display_name, user.email, user.role.to_db_str()],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, user_id: &str) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        let user = conn
            .query_row(
                "SELECT user_id, display_name, email, role FROM users WHERE user_id = ?1",
                params![user_id],
                map_user_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn list_by_role(&self, role: UserRole) -> RepositoryResult<Vec<User>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, display_name, email, role FROM users WHERE role = ?1 ORDER BY user_id",
        )?;
        let users = stmt
            .query_map(params![role.to_db_str()], map_user_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

impl IdentityProvider for UserRepository {
    fn resolve(&self, user_id: &str) -> RepositoryResult<Option<Actor>> {
        Ok(self.find_by_id(user_id)?.map(|u| u.to_actor()))
    }

    fn list_by_role(&self, role: UserRole) -> RepositoryResult<Vec<Actor>> {
        Ok(UserRepository::list_by_role(self, role)?
            .iter()
            .map(User::to_actor)
            .collect())
    }
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        role: UserRole::from_str(&row.get::<_, String>(3)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    #[test]
    fn test_resolve_and_list_by_role() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let repo = UserRepository::from_connection(Arc::new(Mutex::new(conn)));

        for (id, role) in [
            ("A1", UserRole::Admin),
            ("A2", UserRole::Admin),
            ("OP1", UserRole::StationOperator),
        ] {
            repo.create_user(&User {
                user_id: id.to_string(),
                display_name: id.to_lowercase(),
                email: None,
                role,
            })
            .unwrap();
        }

        let provider: &dyn IdentityProvider = &repo;
        let admins = provider.list_by_role(UserRole::Admin).unwrap();
        assert_eq!(admins.len(), 2);
        assert!(admins.iter().all(Actor::is_admin));

        let op = provider.resolve("OP1").unwrap().unwrap();
        assert!(op.can_operate_stations());
        assert!(provider.resolve("ghost").unwrap().is_none());
    }
}
