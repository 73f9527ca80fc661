// ==========================================
// 车辆合规管理系统 - 应用层
// ==========================================
// 职责: 组合根与运行环境（数据库路径）
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
