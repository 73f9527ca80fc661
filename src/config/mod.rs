// ==========================================
// 车辆合规管理系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod compliance_config;
pub mod compliance_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use compliance_config::{LoadConfig, RecommendationConfig, SchedulerConfig};
pub use compliance_config_trait::ComplianceConfigReader;
pub use config_manager::{config_keys, ConfigManager};
