// ==========================================
// 车辆合规管理系统 - 核心库
// ==========================================
// 职责: 合规状态派生、到期提醒调度、站点负载跟踪、站点推荐
// 技术栈: Rust + SQLite + Tokio
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组合根
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AvailabilityTier, CheckMethod, ComplianceStatus, LoadTier, NotificationCategory, UserRole,
    VehicleType,
};

// 领域实体
pub use domain::{ComplianceCheck, Notification, Station, StationRating, User, Vehicle};

// 引擎
pub use engine::{
    ComplianceStatusEngine, LoadTracker, RecommendationEngine, ReminderScheduler,
};

// API
pub use api::{ApiError, ApiResult, ComplianceApi, StationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "FuelLens 车辆合规管理系统";
