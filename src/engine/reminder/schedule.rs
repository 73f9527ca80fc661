// ==========================================
// 车辆合规管理系统 - 周期计划
// ==========================================
// 职责: 计算每日/每周任务的下一次触发时间（本地时间）
// ==========================================

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// 周期计划
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurringSchedule {
    /// 每天 hour:minute
    Daily { hour: u32, minute: u32 },
    /// 每周 weekday 的 hour:minute
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
}

impl RecurringSchedule {
    pub fn daily(hour: u32) -> Self {
        RecurringSchedule::Daily { hour, minute: 0 }
    }

    pub fn weekly(weekday: Weekday, hour: u32) -> Self {
        RecurringSchedule::Weekly {
            weekday,
            hour,
            minute: 0,
        }
    }

    /// 严格晚于 after 的下一次触发时间
    ///
    /// # 返回
    /// - None: 时刻不合法（hour > 23 或 minute > 59）
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            RecurringSchedule::Daily { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                let today = after.date().and_time(time);
                if today > after {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
            RecurringSchedule::Weekly {
                weekday,
                hour,
                minute,
            } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
                let date = after.date();
                let ahead = days_until(date, weekday);
                let candidate = (date + Duration::days(ahead)).and_time(time);
                if candidate > after {
                    Some(candidate)
                } else {
                    Some(candidate + Duration::days(7))
                }
            }
        }
    }
}

impl std::fmt::Display for RecurringSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurringSchedule::Daily { hour, minute } => write!(f, "daily@{:02}:{:02}", hour, minute),
            RecurringSchedule::Weekly {
                weekday,
                hour,
                minute,
            } => write!(f, "weekly@{}-{:02}:{:02}", weekday, hour, minute),
        }
    }
}

/// 从 date 到下一个（含当天）weekday 的天数
fn days_until(date: NaiveDate, weekday: Weekday) -> i64 {
    let from = date.weekday().num_days_from_monday() as i64;
    let to = weekday.num_days_from_monday() as i64;
    (to - from).rem_euclid(7)
}
