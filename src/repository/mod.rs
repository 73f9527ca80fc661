// ==========================================
// 车辆合规管理系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod check_repo;
pub mod directory;
pub mod error;
pub mod notification_repo;
pub mod rating_repo;
pub mod station_repo;
pub mod user_repo;
pub mod vehicle_repo;

// 重导出核心仓储
pub use check_repo::ComplianceCheckRepository;
pub use directory::SqliteDirectory;
pub use error::{RepositoryError, RepositoryResult};
pub use notification_repo::NotificationRepository;
pub use rating_repo::StationRatingRepository;
pub use station_repo::StationRepository;
pub use user_repo::UserRepository;
pub use vehicle_repo::VehicleRepository;
