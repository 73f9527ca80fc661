// ==========================================
// 车辆合规管理系统 - API 层
// ==========================================
// 职责: 对外业务接口（由控制器层调用），组合引擎与仓储
// ==========================================

pub mod compliance_api;
pub mod error;
pub mod station_api;
pub mod validator;

pub use compliance_api::{ComplianceApi, StationComplianceStats, VehicleStatusView};
pub use error::{ApiError, ApiResult};
pub use station_api::StationApi;
