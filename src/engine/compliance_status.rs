// ==========================================
// 车辆合规管理系统 - 合规状态派生引擎
// ==========================================
// 职责: 从证书到期日派生合规状态（纯函数，无副作用）
// 红线: 检查入口、每日巡检、读取校正统一调用本引擎，禁止各处重写阈值
// ==========================================

use crate::domain::types::ComplianceStatus;
use chrono::NaiveDate;

/// 即将到期窗口（天，含边界）
pub const EXPIRING_SOON_WINDOW_DAYS: i64 = 30;

// ==========================================
// ComplianceStatusEngine
// ==========================================
pub struct ComplianceStatusEngine;

impl ComplianceStatusEngine {
    /// 派生合规状态
    ///
    /// # 规则
    /// 1. 无到期日 → Valid（无证书要求不视为违规）
    /// 2. as_of > expiry → Expired
    /// 3. 0 <= (expiry - as_of) <= 30 → ExpiringSoon
    /// 4. 其他 → Valid
    pub fn derive(expiry_date: Option<NaiveDate>, as_of: NaiveDate) -> ComplianceStatus {
        let expiry = match expiry_date {
            Some(date) => date,
            None => return ComplianceStatus::Valid,
        };

        if as_of > expiry {
            return ComplianceStatus::Expired;
        }

        let days_left = (expiry - as_of).num_days();
        if days_left <= EXPIRING_SOON_WINDOW_DAYS {
            ComplianceStatus::ExpiringSoon
        } else {
            ComplianceStatus::Valid
        }
    }

    /// 距到期天数（展示用）
    ///
    /// # 返回
    /// - None: 无到期日
    /// - Some(n): n >= 0，已过期时下限截断为 0
    pub fn days_to_expiry(expiry_date: Option<NaiveDate>, as_of: NaiveDate) -> Option<i64> {
        expiry_date.map(|expiry| (expiry - as_of).num_days().max(0))
    }
}
