// ==========================================
// 车辆合规管理系统 - 通知
// ==========================================
// 对齐: notifications 表
// ==========================================

use crate::domain::types::NotificationCategory;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 已投递的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}
