// ==========================================
// 车辆合规管理系统 - 站点评价仓储
// ==========================================
// 主键: (station_id, rater_id)，重复评价覆盖
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::station::StationRating;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

pub struct StationRatingRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StationRatingRepository {
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

    /// 写入评价（同一评价人覆盖）
    pub fn upsert(&self, rating: &StationRating) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO station_ratings (
                station_id, rater_id, compliance_strictness, waiting_time,
                service_quality, overall_rating, review, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(station_id, rater_id) DO UPDATE SET
                compliance_strictness = excluded.compliance_strictness,
                waiting_time = excluded.waiting_time,
                service_quality = excluded.service_quality,
                overall_rating = excluded.overall_rating,
                review = excluded.review,
                created_at = excluded.created_at
            "#,
            params![
                rating.station_id,
                rating.rater_id,
                rating.compliance_strictness,
                rating.waiting_time,
                rating.service_quality,
                rating.overall_rating,
                rating.review,
                rating.created_at,
            ],
        )?;
        Ok(())
    }

    /// 站点全部评价（最新在前）
    pub fn list_by_station(&self, station_id: &str) -> RepositoryResult<Vec<StationRating>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT station_id, rater_id, compliance_strictness, waiting_time,
                   service_quality, overall_rating, review, created_at
            FROM station_ratings
            WHERE station_id = ?1
            ORDER BY created_at DESC, rater_id
            "#,
        )?;
        let ratings = stmt
            .query_map(params![station_id], map_rating_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ratings)
    }
}

fn map_rating_row(row: &Row<'_>) -> rusqlite::Result<StationRating> {
    Ok(StationRating {
        station_id: row.get(0)?,
        rater_id: row.get(1)?,
        compliance_strictness: row.get(2)?,
        waiting_time: row.get(3)?,
        service_quality: row.get(4)?,
        overall_rating: row.get(5)?,
        review: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use chrono::NaiveDate;

    #[test]
    fn test_rerating_replaces() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO stations (station_id, name, owner_id, address, city, updated_at)
             VALUES ('S1', 'S1', 'OP', '', '', '2026-06-01 00:00:00')",
            [],
        )
        .unwrap();
        let repo = StationRatingRepository::from_connection(Arc::new(Mutex::new(conn)));

        let mut rating = StationRating {
            station_id: "S1".to_string(),
            rater_id: "U1".to_string(),
            compliance_strictness: 5,
            waiting_time: 2,
            service_quality: 2,
            overall_rating: 3.0,
            review: Some("slow".to_string()),
            created_at: NaiveDate::from_ymd_opt(2026, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        };
        repo.upsert(&rating).unwrap();
        rating.waiting_time = 5;
        rating.overall_rating = 4.0;
        repo.upsert(&rating).unwrap();

        let ratings = repo.list_by_station("S1").unwrap();
        assert_eq!(ratings, vec![rating]);
    }
}
