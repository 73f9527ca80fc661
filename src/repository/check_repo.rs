// ==========================================
// 车辆合规管理系统 - 合规检查记录仓储
// ==========================================
// 红线: 检查记录只追加，不提供更新接口
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::compliance::{CheckFilter, ComplianceCheck};
use crate::domain::types::{CheckMethod, ComplianceStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ComplianceCheckRepository
// ==========================================
pub struct ComplianceCheckRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ComplianceCheckRepository {
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

    /// 追加一条检查记录
    ///
    /// # 错误
    /// - ForeignKeyViolation: 车辆或站点不存在
    pub fn insert(&self, check: &ComplianceCheck) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO compliance_checks (
                check_id, vehicle_id, station_id, actor_id,
                method, status, note, checked_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                check.check_id,
                check.vehicle_id,
                check.station_id,
                check.actor_id,
                check.method.to_db_str(),
                check.status.to_db_str(),
                check.note,
                check.checked_at,
            ],
        )?;
        Ok(())
    }

    /// 按条件查询（checked_at 倒序）
    pub fn list(&self, filter: &CheckFilter) -> RepositoryResult<Vec<ComplianceCheck>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(vehicle_id) = &filter.vehicle_id {
            conditions.push("vehicle_id = ?");
            values.push(Value::Text(vehicle_id.clone()));
        }
        if let Some(station_id) = &filter.station_id {
            conditions.push("station_id = ?");
            values.push(Value::Text(station_id.clone()));
        }
        if let Some(since) = filter.since {
            // 与 rusqlite chrono 绑定格式一致，保证文本比较有序
            conditions.push("checked_at >= ?");
            values.push(Value::Text(since.format("%F %T%.f").to_string()));
        }

        let mut sql = String::from(
            "SELECT check_id, vehicle_id, station_id, actor_id, method, status, note, checked_at \
             FROM compliance_checks",
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY checked_at DESC, check_id DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let checks = stmt
            .query_map(params_from_iter(values), map_check_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(checks)
    }

    /// 车辆检查次数
    pub fn count_for_vehicle(&self, vehicle_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM compliance_checks WHERE vehicle_id = ?1",
            params![vehicle_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

fn map_check_row(row: &Row<'_>) -> rusqlite::Result<ComplianceCheck> {
    Ok(ComplianceCheck {
        check_id: row.get(0)?,
        vehicle_id: row.get(1)?,
        station_id: row.get(2)?,
        actor_id: row.get(3)?,
        method: CheckMethod::from_str(&row.get::<_, String>(4)?),
        status: ComplianceStatus::from_str(&row.get::<_, String>(5)?),
        note: row.get(6)?,
        checked_at: row.get(7)?,
    })
}
