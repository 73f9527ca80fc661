// ==========================================
// 车辆合规管理系统 - 通知投递
// ==========================================
// 职责: 定义通知投递 trait，提供尽力而为的重试投递
// 红线: 投递失败只记录日志，不回滚合规状态/检查记录写入
// ==========================================

use crate::domain::types::NotificationCategory;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 通知投递错误
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("通知被拒绝: {0}")]
    Rejected(String),

    #[error("通知通道不可用: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 通知投递 Trait
///
/// # 实现说明
/// - `NotificationRepository` 写入 notifications 表
/// - 实现方可自行排队/重试，调用方不感知
pub trait NotificationDispatcher: Send + Sync {
    fn notify(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        category: NotificationCategory,
    ) -> Result<(), DispatchError>;
}

/// 投递消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
}

/// 尽力而为投递（失败重试 max_retries 次）
///
/// # 返回
/// - true: 投递成功
/// - false: 重试耗尽，已记录 warn 日志
pub fn dispatch_best_effort(
    dispatcher: &dyn NotificationDispatcher,
    notification: &OutgoingNotification,
    max_retries: u32,
) -> bool {
    let mut attempt = 0;
    loop {
        match dispatcher.notify(
            &notification.user_id,
            &notification.title,
            &notification.message,
            notification.category,
        ) {
            Ok(()) => {
                tracing::debug!(
                    user_id = %notification.user_id,
                    attempt,
                    "通知投递成功"
                );
                return true;
            }
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::debug!(
                    user_id = %notification.user_id,
                    attempt,
                    error = %e,
                    "通知投递失败，重试"
                );
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %notification.user_id,
                    title = %notification.title,
                    attempts = attempt + 1,
                    error = %e,
                    "通知投递失败，已放弃"
                );
                return false;
            }
        }
    }
}
