// ==========================================
// 车辆合规管理系统 - 合规检查记录
// ==========================================
// 对齐: compliance_checks 表
// 红线: 检查记录不可变，仅随车辆删除级联删除
// ==========================================

use crate::domain::types::{CheckMethod, ComplianceStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// ComplianceCheck - 合规检查事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub check_id: String,
    pub vehicle_id: String,
    pub station_id: String,
    pub actor_id: String,
    pub method: CheckMethod,
    pub status: ComplianceStatus, // 检查时刻的状态快照
    pub note: Option<String>,
    pub checked_at: NaiveDateTime,
}

// ==========================================
// CheckFilter - 检查记录查询条件
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CheckFilter {
    pub vehicle_id: Option<String>,
    pub station_id: Option<String>,
    /// 含边界
    pub since: Option<NaiveDateTime>,
    /// 按时间倒序取前 N 条
    pub limit: Option<usize>,
}

impl CheckFilter {
    pub fn for_vehicle(vehicle_id: &str) -> Self {
        Self {
            vehicle_id: Some(vehicle_id.to_string()),
            ..Self::default()
        }
    }

    pub fn for_station(station_id: &str) -> Self {
        Self {
            station_id: Some(station_id.to_string()),
            ..Self::default()
        }
    }

    pub fn since(mut self, since: NaiveDateTime) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

// ==========================================
// StatusCounts - 按状态计数
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub valid: usize,
    pub expiring_soon: usize,
    pub expired: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: ComplianceStatus) {
        match status {
            ComplianceStatus::Valid => self.valid += 1,
            ComplianceStatus::ExpiringSoon => self.expiring_soon += 1,
            ComplianceStatus::Expired => self.expired += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.valid + self.expiring_soon + self.expired
    }

    /// 合规率（valid 占比，百分数）；无数据时为 0
    pub fn compliance_rate_pct(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.valid as f64 / total as f64 * 100.0
        }
    }
}

impl FromIterator<ComplianceStatus> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = ComplianceStatus>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for status in iter {
            counts.add(status);
        }
        counts
    }
}

// ==========================================
// DailyTrend - 每日检查趋势
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub checks: usize,
    pub counts: StatusCounts,
}

impl DailyTrend {
    /// 按日期分组汇总（日期升序）
    pub fn aggregate(checks: &[ComplianceCheck]) -> Vec<DailyTrend> {
        let mut by_day: BTreeMap<NaiveDate, StatusCounts> = BTreeMap::new();
        for check in checks {
            by_day
                .entry(check.checked_at.date())
                .or_default()
                .add(check.status);
        }

        by_day
            .into_iter()
            .map(|(date, counts)| DailyTrend {
                date,
                checks: counts.total(),
                counts,
            })
            .collect()
    }
}
