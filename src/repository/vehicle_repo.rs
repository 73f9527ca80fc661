// ==========================================
// 车辆合规管理系统 - 车辆仓储
// ==========================================
// 红线: Repository 不含业务逻辑（状态派生由引擎完成）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::{ComplianceStatus, VehicleType};
use crate::domain::vehicle::{Vehicle, VehicleFilter};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const VEHICLE_COLUMNS: &str = "vehicle_id, plate_number, owner_id, vehicle_type, test_date, \
     expiry_date, compliance_status, created_at, updated_at";

// ==========================================
// VehicleRepository - 车辆仓储
// ==========================================
/// 车辆仓储
/// 职责: 管理 vehicles 表的 CRUD 操作
pub struct VehicleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VehicleRepository {
    /// 创建新的 VehicleRepository 实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或更新车辆（按 vehicle_id）
    pub fn upsert(&self, vehicle: &Vehicle) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO vehicles (
                vehicle_id, plate_number, owner_id, vehicle_type,
                test_date, expiry_date, compliance_status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(vehicle_id) DO UPDATE SET
                plate_number = excluded.plate_number,
                owner_id = excluded.owner_id,
                vehicle_type = excluded.vehicle_type,
                test_date = excluded.test_date,
                expiry_date = excluded.expiry_date,
                compliance_status = excluded.compliance_status,
                updated_at = excluded.updated_at
            "#,
            params![
                vehicle.vehicle_id,
                vehicle.plate_number,
                vehicle.owner_id,
                vehicle.vehicle_type.to_db_str(),
                vehicle.test_date,
                vehicle.expiry_date,
                vehicle.compliance_status.to_db_str(),
                vehicle.created_at,
                vehicle.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按主键查询
    ///
    /// # 返回
    /// - Ok(Some(Vehicle)): 找到车辆
    /// - Ok(None): 未找到
    pub fn find_by_id(&self, vehicle_id: &str) -> RepositoryResult<Option<Vehicle>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM vehicles WHERE vehicle_id = ?1", VEHICLE_COLUMNS);
        let vehicle = conn
            .query_row(&sql, params![vehicle_id], map_vehicle_row)
            .optional()?;
        Ok(vehicle)
    }

    /// 按车牌查询
    pub fn find_by_plate(&self, plate_number: &str) -> RepositoryResult<Option<Vehicle>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM vehicles WHERE plate_number = ?1", VEHICLE_COLUMNS);
        let vehicle = conn
            .query_row(&sql, params![plate_number], map_vehicle_row)
            .optional()?;
        Ok(vehicle)
    }

    /// 按条件查询（按 vehicle_id 升序）
    pub fn list(&self, filter: &VehicleFilter) -> RepositoryResult<Vec<Vehicle>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if filter.with_expiry_only {
            conditions.push("expiry_date IS NOT NULL");
        }
        if let Some(owner_id) = &filter.owner_id {
            conditions.push("owner_id = ?");
            values.push(Value::Text(owner_id.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push("compliance_status = ?");
            values.push(Value::Text(status.to_db_str().to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM vehicles {} ORDER BY vehicle_id",
            VEHICLE_COLUMNS, where_clause
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let vehicles = stmt
            .query_map(params_from_iter(values), map_vehicle_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(vehicles)
    }

    /// 按到期日条件回写缓存状态
    ///
    /// 只写 compliance_status / updated_at 两列；
    /// 到期日已被并发修改（不等于 expected_expiry）时不写入
    ///
    /// # 返回
    /// - true: 已写入
    /// - false: 车辆不存在或到期日已变化
    pub fn update_status_if_expiry(
        &self,
        vehicle_id: &str,
        expected_expiry: Option<NaiveDate>,
        status: ComplianceStatus,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE vehicles
            SET compliance_status = ?1, updated_at = ?2
            WHERE vehicle_id = ?3 AND expiry_date IS ?4
            "#,
            params![status.to_db_str(), at, vehicle_id, expected_expiry],
        )?;
        Ok(affected > 0)
    }

    /// 删除车辆（检查记录通过外键级联删除）
    ///
    /// # 返回
    /// - true: 已删除
    /// - false: 车辆不存在
    pub fn delete(&self, vehicle_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM vehicles WHERE vehicle_id = ?1", params![vehicle_id])?;
        Ok(affected > 0)
    }
}

fn map_vehicle_row(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        vehicle_id: row.get(0)?,
        plate_number: row.get(1)?,
        owner_id: row.get(2)?,
        vehicle_type: VehicleType::from_str(&row.get::<_, String>(3)?),
        test_date: row.get(4)?,
        expiry_date: row.get(5)?,
        compliance_status: ComplianceStatus::from_str(&row.get::<_, String>(6)?),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
