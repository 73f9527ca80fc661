// ==========================================
// 车辆合规管理系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/Engine错误为调用方可理解的错误消息
// ==========================================

use crate::engine::error::EngineError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无权限: {0}")]
    Forbidden(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::LockPoisoned(msg) => ApiError::InternalError(msg),
            EngineError::Repository(e) => e.into(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_not_found_maps_to_not_found() {
        let err: ApiError = EngineError::not_found("Vehicle", "V9").into();
        assert!(matches!(err, ApiError::NotFound(ref m) if m.contains("V9")));
    }

    #[test]
    fn test_nested_repository_error_unwrapped() {
        let err: ApiError = EngineError::Repository(RepositoryError::UniqueConstraintViolation(
            "vehicles.plate_number".to_string(),
        ))
        .into();
        assert!(matches!(err, ApiError::BusinessRuleViolation(_)));
    }

    #[test]
    fn test_lock_error_maps_to_connection_error() {
        let err: ApiError = RepositoryError::LockError("poisoned".to_string()).into();
        assert!(matches!(err, ApiError::DatabaseConnectionError(ref m) if m.contains("poisoned")));

        let err: ApiError = EngineError::LockPoisoned("调度器状态锁".to_string()).into();
        assert!(matches!(err, ApiError::InternalError(_)));
    }
}
