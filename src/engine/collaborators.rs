// ==========================================
// 车辆合规管理系统 - 引擎层外部协作者接口
// ==========================================
// 职责: 定义目录（车辆/站点/检查记录）与身份解析 trait，实现依赖倒置
// 说明: Engine 层定义 trait，Repository 层提供 SQLite 实现
// ==========================================

use crate::domain::{
    Actor, AvailabilityTier, CheckFilter, ComplianceCheck, ComplianceStatus, LoadTier, Station,
    StationRating, UserRole, Vehicle, VehicleFilter,
};
use chrono::{NaiveDate, NaiveDateTime};
use crate::repository::error::RepositoryResult;

// ==========================================
// Directory Trait
// ==========================================
/// 实体目录（CRUD 存储）
///
/// # 实现说明
/// - `SqliteDirectory` 基于 rusqlite 仓储实现
/// - get_* 未找到时返回 `Ok(None)`，由调用方决定是否转为 NotFound
pub trait Directory: Send + Sync {
    // ===== 车辆 =====
    fn get_vehicle(&self, vehicle_id: &str) -> RepositoryResult<Option<Vehicle>>;
    fn list_vehicles(&self, filter: &VehicleFilter) -> RepositoryResult<Vec<Vehicle>>;
    fn save_vehicle(&self, vehicle: &Vehicle) -> RepositoryResult<()>;
    /// 仅回写缓存状态；到期日已不等于 expected_expiry 时不写入，返回 false
    fn update_vehicle_status(
        &self,
        vehicle_id: &str,
        expected_expiry: Option<NaiveDate>,
        status: ComplianceStatus,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool>;
    /// 删除车辆（级联删除其检查记录），返回是否存在
    fn delete_vehicle(&self, vehicle_id: &str) -> RepositoryResult<bool>;

    // ===== 站点 =====
    fn get_station(&self, station_id: &str) -> RepositoryResult<Option<Station>>;
    fn list_active_stations(&self) -> RepositoryResult<Vec<Station>>;
    fn save_station(&self, station: &Station) -> RepositoryResult<()>;
    /// 仅写负载等级列
    fn update_station_load(&self, station_id: &str, load: LoadTier, at: NaiveDateTime) -> RepositoryResult<bool>;
    /// 仅写供应状态（is_open 为 None 时保持不变）
    fn update_station_availability(
        &self,
        station_id: &str,
        availability: AvailabilityTier,
        is_open: Option<bool>,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool>;
    /// 仅写审批列
    fn approve_station(&self, station_id: &str, at: NaiveDateTime, notes: Option<&str>) -> RepositoryResult<bool>;

    // ===== 检查记录 =====
    fn save_check(&self, check: &ComplianceCheck) -> RepositoryResult<()>;
    /// 按条件查询（按 checked_at 倒序）
    fn list_checks(&self, filter: &CheckFilter) -> RepositoryResult<Vec<ComplianceCheck>>;

    // ===== 站点评价 =====
    /// 同一 (station_id, rater_id) 覆盖写入
    fn save_rating(&self, rating: &StationRating) -> RepositoryResult<()>;
    fn list_ratings(&self, station_id: &str) -> RepositoryResult<Vec<StationRating>>;
}

// ==========================================
// IdentityProvider Trait
// ==========================================
/// 身份解析（“谁在操作、什么角色”）
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, user_id: &str) -> RepositoryResult<Option<Actor>>;
    fn list_by_role(&self, role: UserRole) -> RepositoryResult<Vec<Actor>>;
}
