// ==========================================
// 车辆合规管理系统 - 提醒/周报消息组装
// ==========================================
// 文案: locales/*.yml (rust-i18n)，占位符 %{name}
// 红线: 提醒正文必须包含车牌号与剩余天数
// ==========================================

use crate::domain::{NotificationCategory, StatusCounts, Vehicle};
use crate::engine::notifier::OutgoingNotification;
use crate::i18n::{t, t_with_args};
use chrono::NaiveDate;

/// 到期提醒
pub fn reminder_notification(vehicle: &Vehicle, offset_days: i64, expiry_date: NaiveDate) -> OutgoingNotification {
    let days = offset_days.to_string();
    let expiry = expiry_date.format("%Y-%m-%d").to_string();
    let args = [
        ("plate", vehicle.plate_number.as_str()),
        ("days", days.as_str()),
        ("expiry", expiry.as_str()),
    ];

    OutgoingNotification {
        user_id: vehicle.owner_id.clone(),
        title: t("reminder.title"),
        message: t_with_args("reminder.message", &args),
        category: NotificationCategory::ComplianceExpiry,
    }
}

/// 管理员周报
pub fn digest_notification(admin_id: &str, counts: &StatusCounts, as_of: NaiveDate) -> OutgoingNotification {
    let total = counts.total().to_string();
    let valid = counts.valid.to_string();
    let expiring = counts.expiring_soon.to_string();
    let expired = counts.expired.to_string();
    let date = as_of.format("%Y-%m-%d").to_string();
    let args = [
        ("date", date.as_str()),
        ("total", total.as_str()),
        ("valid", valid.as_str()),
        ("expiring_soon", expiring.as_str()),
        ("expired", expired.as_str()),
    ];

    OutgoingNotification {
        user_id: admin_id.to_string(),
        title: t("digest.title"),
        message: t_with_args("digest.message", &args),
        category: NotificationCategory::System,
    }
}
