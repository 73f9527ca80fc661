// ==========================================
// 车辆合规管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod compliance;
pub mod notification;
pub mod station;
pub mod types;
pub mod user;
pub mod vehicle;

// 重导出核心类型
pub use compliance::{CheckFilter, ComplianceCheck, DailyTrend, StatusCounts};
pub use notification::Notification;
pub use station::{RatingSummary, Station, StationRating};
pub use types::{
    AvailabilityTier, CheckMethod, ComplianceStatus, LoadTier, NotificationCategory, UserRole,
    VehicleType,
};
pub use user::{Actor, User};
pub use vehicle::{Vehicle, VehicleFilter};
