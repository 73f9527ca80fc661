// ==========================================
// 车辆合规管理系统 - 类型化配置
// ==========================================
// 职责: 调度/负载/推荐三组配置的结构与默认值
// 说明: 由 ComplianceConfigReader 从 config_kv 表组装
// ==========================================

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// 默认提醒偏移（到期前天数）
pub const DEFAULT_REMINDER_OFFSETS: [i64; 4] = [30, 15, 7, 1];

/// 提醒偏移上限（天）
pub const MAX_REMINDER_OFFSET_DAYS: i64 = 365;

// ==========================================
// SchedulerConfig - 提醒调度配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 到期前提醒偏移（天）
    pub reminder_offsets: Vec<i64>,
    /// 提醒触发时刻（本地小时）
    pub reminder_hour: u32,
    /// 每日巡检时刻（本地小时）
    pub daily_sweep_hour: u32,
    /// 周报星期
    pub weekly_digest_weekday: Weekday,
    /// 周报时刻（本地小时）
    pub weekly_digest_hour: u32,
    /// 调度循环最长休眠（秒）
    pub poll_interval_secs: u64,
    /// 通知投递失败重试次数
    pub dispatch_max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reminder_offsets: DEFAULT_REMINDER_OFFSETS.to_vec(),
            reminder_hour: 9,
            daily_sweep_hour: 9,
            weekly_digest_weekday: Weekday::Sun,
            weekly_digest_hour: 10,
            poll_interval_secs: 60,
            dispatch_max_retries: 2,
        }
    }
}

impl SchedulerConfig {
    /// 校验配置
    ///
    /// # 返回
    /// - Err(String): 第一个不合法项的说明
    pub fn validate(&self) -> Result<(), String> {
        if self.reminder_offsets.is_empty() {
            return Err("reminder_offsets 不能为空".to_string());
        }
        if let Some(bad) = self
            .reminder_offsets
            .iter()
            .find(|&&d| d < 1 || d > MAX_REMINDER_OFFSET_DAYS)
        {
            return Err(format!(
                "reminder_offsets 超出范围: {} (允许 1..={})",
                bad, MAX_REMINDER_OFFSET_DAYS
            ));
        }
        for (name, hour) in [
            ("reminder_hour", self.reminder_hour),
            ("daily_sweep_hour", self.daily_sweep_hour),
            ("weekly_digest_hour", self.weekly_digest_hour),
        ] {
            if hour > 23 {
                return Err(format!("{} 超出范围: {}", name, hour));
            }
        }
        if self.poll_interval_secs == 0 {
            return Err("poll_interval_secs 必须大于 0".to_string());
        }
        Ok(())
    }

    /// 去重后的偏移（降序）
    pub fn normalized_offsets(&self) -> Vec<i64> {
        let mut offsets = self.reminder_offsets.clone();
        offsets.sort_unstable_by(|a, b| b.cmp(a));
        offsets.dedup();
        offsets
    }
}

// ==========================================
// LoadConfig - 站点负载配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// 滑动窗口（分钟）
    pub window_minutes: i64,
    /// 繁忙阈值（窗口内检查数 >=）
    pub busy_threshold: usize,
    /// 正常阈值（窗口内检查数 >=）
    pub normal_threshold: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            window_minutes: 60,
            busy_threshold: 10,
            normal_threshold: 5,
        }
    }
}

impl LoadConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.window_minutes <= 0 {
            return Err(format!("window_minutes 必须大于 0: {}", self.window_minutes));
        }
        if self.normal_threshold == 0 || self.busy_threshold <= self.normal_threshold {
            return Err(format!(
                "负载阈值不合法: normal={}, busy={}",
                self.normal_threshold, self.busy_threshold
            ));
        }
        Ok(())
    }
}

// ==========================================
// RecommendationConfig - 站点推荐配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationConfig {
    pub default_radius_km: f64,
    pub default_top_k: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 20.0,
            default_top_k: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(LoadConfig::default().validate().is_ok());
    }

    #[test]
    fn test_offset_out_of_range_rejected() {
        let cfg = SchedulerConfig {
            reminder_offsets: vec![30, 0],
            ..SchedulerConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = SchedulerConfig {
            reminder_offsets: vec![400],
            ..SchedulerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_normalized_offsets_dedup_desc() {
        let cfg = SchedulerConfig {
            reminder_offsets: vec![7, 30, 1, 7, 15],
            ..SchedulerConfig::default()
        };
        assert_eq!(cfg.normalized_offsets(), vec![30, 15, 7, 1]);
    }
}
