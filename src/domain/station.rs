// ==========================================
// 车辆合规管理系统 - 站点领域模型
// ==========================================
// 对齐: stations 表 / station_ratings 表
// 红线: load 只能由 LoadTracker 或管理员显式覆写路径写入
// ==========================================

use crate::domain::types::{AvailabilityTier, LoadTier};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Station - 服务站点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String,
    pub name: String,
    pub owner_id: String,
    pub address: String,
    pub city: String,

    // ===== 坐标（缺失时不参与推荐）=====
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // ===== 开关 =====
    pub is_active: bool,
    pub is_open: bool,
    pub is_approved: bool,
    pub approved_at: Option<NaiveDateTime>,
    pub approval_notes: Option<String>,

    // ===== 实时等级 =====
    pub load: LoadTier,
    pub availability: AvailabilityTier,

    pub updated_at: NaiveDateTime,
}

impl Station {
    /// 是否可以办理合规检查（启用且已审批）
    pub fn is_operational(&self) -> bool {
        self.is_active && self.is_approved
    }

    /// 坐标（两者均存在时返回）
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

// ==========================================
// StationRating - 站点评价
// ==========================================
// 每个 (station_id, rater_id) 仅保留一条，重复评价覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRating {
    pub station_id: String,
    pub rater_id: String,
    pub compliance_strictness: u8, // 1-5
    pub waiting_time: u8,          // 1-5
    pub service_quality: u8,       // 1-5
    pub overall_rating: f64,       // 三项均值
    pub review: Option<String>,
    pub created_at: NaiveDateTime,
}

/// 站点评价汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub station_id: String,
    pub rating_count: usize,
    pub avg_compliance_strictness: f64,
    pub avg_waiting_time: f64,
    pub avg_service_quality: f64,
    pub avg_overall: f64,
}

impl RatingSummary {
    /// 从评价列表汇总（无评价时均值为 0）
    pub fn from_ratings(station_id: &str, ratings: &[StationRating]) -> Self {
        let n = ratings.len();
        let avg = |f: fn(&StationRating) -> f64| {
            if n == 0 {
                0.0
            } else {
                ratings.iter().map(f).sum::<f64>() / n as f64
            }
        };

        Self {
            station_id: station_id.to_string(),
            rating_count: n,
            avg_compliance_strictness: avg(|r| r.compliance_strictness as f64),
            avg_waiting_time: avg(|r| r.waiting_time as f64),
            avg_service_quality: avg(|r| r.service_quality as f64),
            avg_overall: avg(|r| r.overall_rating),
        }
    }
}
