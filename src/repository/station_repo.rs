// ==========================================
// 车辆合规管理系统 - 站点仓储
// ==========================================
// 红线: Repository 不含业务逻辑（负载等级由 LoadTracker 计算后单列写入）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::station::Station;
use crate::domain::types::{AvailabilityTier, LoadTier};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const STATION_COLUMNS: &str = "station_id, name, owner_id, address, city, latitude, longitude, \
     is_active, is_open, is_approved, approved_at, approval_notes, live_load, availability, updated_at";

// ==========================================
// StationRepository - 站点仓储
// ==========================================
pub struct StationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StationRepository {
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

    /// 插入或整体更新站点
    pub fn upsert(&self, station: &Station) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO stations (
                station_id, name, owner_id, address, city, latitude, longitude,
                is_active, is_open, is_approved, approved_at, approval_notes,
                live_load, availability, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(station_id) DO UPDATE SET
                name = excluded.name,
                owner_id = excluded.owner_id,
                address = excluded.address,
                city = excluded.city,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                is_active = excluded.is_active,
                is_open = excluded.is_open,
                is_approved = excluded.is_approved,
                approved_at = excluded.approved_at,
                approval_notes = excluded.approval_notes,
                live_load = excluded.live_load,
                availability = excluded.availability,
                updated_at = excluded.updated_at
            "#,
            params![
                station.station_id,
                station.name,
                station.owner_id,
                station.address,
                station.city,
                station.latitude,
                station.longitude,
                station.is_active,
                station.is_open,
                station.is_approved,
                station.approved_at,
                station.approval_notes,
                station.load.to_db_str(),
                station.availability.to_db_str(),
                station.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 只写负载等级
    pub fn update_load(&self, station_id: &str, load: LoadTier, at: NaiveDateTime) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE stations SET live_load = ?1, updated_at = ?2 WHERE station_id = ?3",
            params![load.to_db_str(), at, station_id],
        )?;
        Ok(affected > 0)
    }

    /// 只写供应状态与营业开关（is_open 为 None 时保持不变）
    pub fn update_availability(
        &self,
        station_id: &str,
        availability: AvailabilityTier,
        is_open: Option<bool>,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE stations
            SET availability = ?1, is_open = COALESCE(?2, is_open), updated_at = ?3
            WHERE station_id = ?4
            "#,
            params![availability.to_db_str(), is_open, at, station_id],
        )?;
        Ok(affected > 0)
    }

    /// 只写审批列
    pub fn approve(&self, station_id: &str, at: NaiveDateTime, notes: Option<&str>) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE stations
            SET is_approved = 1, approved_at = ?1, approval_notes = ?2, updated_at = ?1
            WHERE station_id = ?3
            "#,
            params![at, notes, station_id],
        )?;
        Ok(affected > 0)
    }

    /// 按主键查询
    pub fn find_by_id(&self, station_id: &str) -> RepositoryResult<Option<Station>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM stations WHERE station_id = ?1", STATION_COLUMNS);
        let station = conn
            .query_row(&sql, params![station_id], map_station_row)
            .optional()?;
        Ok(station)
    }

    /// 查询全部启用站点（按 station_id 升序）
    pub fn list_active(&self) -> RepositoryResult<Vec<Station>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM stations WHERE is_active = 1 ORDER BY station_id",
            STATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let stations = stmt
            .query_map([], map_station_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stations)
    }

    /// 查询运营人员名下站点
    pub fn list_by_owner(&self, owner_id: &str) -> RepositoryResult<Vec<Station>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM stations WHERE owner_id = ?1 ORDER BY station_id",
            STATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let stations = stmt
            .query_map(params![owner_id], map_station_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stations)
    }
}

fn map_station_row(row: &Row<'_>) -> rusqlite::Result<Station> {
    Ok(Station {
        station_id: row.get(0)?,
        name: row.get(1)?,
        owner_id: row.get(2)?,
        address: row.get(3)?,
        city: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        is_active: row.get(7)?,
        is_open: row.get(8)?,
        is_approved: row.get(9)?,
        approved_at: row.get(10)?,
        approval_notes: row.get(11)?,
        load: LoadTier::from_str(&row.get::<_, String>(12)?),
        availability: AvailabilityTier::from_str(&row.get::<_, String>(13)?),
        updated_at: row.get(14)?,
    })
}
