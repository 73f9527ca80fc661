// ==========================================
// 车辆合规管理系统 - 引擎层错误类型
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("内部锁获取失败: {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
