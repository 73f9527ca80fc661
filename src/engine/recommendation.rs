// ==========================================
// 车辆合规管理系统 - 站点推荐引擎
// ==========================================
// 职责: 按距离 + 负载 + 供应给候选站点打分排序（无状态，每次请求重算）
// 评分: distance = max(0, 50 - 2*km)；load: free 30 / normal 15 / busy 5；
//       availability: available 20 / limited 10 / unavailable 0；总分 0-100
// 排序: 总分降序 → 距离升序 → station_id 升序
// ==========================================

use crate::domain::{AvailabilityTier, LoadTier, Station};
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// 地球半径（km）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// ==========================================
// GeoPoint
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// # 错误
    /// - InvalidInput: 非有限值，或纬度不在 [-90, 90]、经度不在 [-180, 180]
    pub fn new(latitude: f64, longitude: f64) -> EngineResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(EngineError::InvalidInput(format!("纬度不合法: {}", latitude)));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(EngineError::InvalidInput(format!("经度不合法: {}", longitude)));
        }
        Ok(Self { latitude, longitude })
    }

    /// 大圆距离（haversine，km）
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

// ==========================================
// 评分
// ==========================================

pub fn distance_score(distance_km: f64) -> f64 {
    (50.0 - 2.0 * distance_km).max(0.0)
}

pub fn load_score(load: LoadTier) -> f64 {
    match load {
        LoadTier::Free => 30.0,
        LoadTier::Normal => 15.0,
        LoadTier::Busy => 5.0,
    }
}

pub fn availability_score(availability: AvailabilityTier) -> f64 {
    match availability {
        AvailabilityTier::Available => 20.0,
        AvailabilityTier::Limited => 10.0,
        AvailabilityTier::Unavailable => 0.0,
    }
}

/// 排序结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStation {
    pub station: Station,
    pub distance_km: f64,
    pub distance_score: f64,
    pub load_score: f64,
    pub availability_score: f64,
    pub total_score: f64,
}

// ==========================================
// RecommendationEngine
// ==========================================
pub struct RecommendationEngine;

impl RecommendationEngine {
    /// 对候选站点打分排序
    ///
    /// # 过滤
    /// - 未启用的站点
    /// - 缺少坐标的站点
    /// - 距离 > radius_km 的站点
    ///
    /// # 错误
    /// - InvalidInput: radius_km 非有限或 <= 0
    pub fn rank(origin: GeoPoint, candidates: &[Station], radius_km: f64) -> EngineResult<Vec<RankedStation>> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(EngineError::InvalidInput(format!("搜索半径必须为正数: {}", radius_km)));
        }

        let mut ranked: Vec<RankedStation> = candidates
            .iter()
            .filter(|s| s.is_active)
            .filter_map(|s| {
                let (lat, lon) = s.coordinates()?;
                let distance_km = haversine_km(origin.latitude, origin.longitude, lat, lon);
                if distance_km > radius_km {
                    return None;
                }
                let d = distance_score(distance_km);
                let l = load_score(s.load);
                let a = availability_score(s.availability);
                Some(RankedStation {
                    station: s.clone(),
                    distance_km,
                    distance_score: d,
                    load_score: l,
                    availability_score: a,
                    total_score: d + l + a,
                })
            })
            .collect();

        ranked.sort_by(compare_ranked);
        Ok(ranked)
    }

    /// 取前 K 个
    ///
    /// # 错误
    /// - InvalidInput: k == 0 或半径不合法
    pub fn top_k(
        origin: GeoPoint,
        candidates: &[Station],
        radius_km: f64,
        k: usize,
    ) -> EngineResult<Vec<RankedStation>> {
        if k == 0 {
            return Err(EngineError::InvalidInput("top_k 必须大于 0".to_string()));
        }
        let mut ranked = Self::rank(origin, candidates, radius_km)?;
        ranked.truncate(k);
        Ok(ranked)
    }
}

fn compare_ranked(a: &RankedStation, b: &RankedStation) -> Ordering {
    b.total_score
        .total_cmp(&a.total_score)
        .then_with(|| a.distance_km.total_cmp(&b.distance_km))
        .then_with(|| a.station.station_id.cmp(&b.station.station_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn station(id: &str, lat: f64, lon: f64, load: LoadTier, availability: AvailabilityTier) -> Station {
        Station {
            station_id: id.to_string(),
            name: id.to_string(),
            owner_id: "OP".to_string(),
            address: String::new(),
            city: String::new(),
            latitude: Some(lat),
            longitude: Some(lon),
            is_active: true,
            is_open: true,
            is_approved: true,
            approved_at: None,
            approval_notes: None,
            load,
            availability,
            updated_at: NaiveDate::from_ymd_opt(2026, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // 1 度经度 @ 赤道 ≈ 111.19 km
        let d = haversine_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.195).abs() < 0.01);
        assert_eq!(haversine_km(28.6, 77.2, 28.6, 77.2), 0.0);
    }

    #[test]
    fn test_scores_range() {
        assert_eq!(distance_score(0.0), 50.0);
        assert_eq!(distance_score(30.0), 0.0);
        let best = distance_score(0.0) + load_score(LoadTier::Free) + availability_score(AvailabilityTier::Available);
        assert_eq!(best, 100.0);
    }

    #[test]
    fn test_tie_broken_by_distance_then_id() {
        let origin = GeoPoint::new(0.0, 0.0).unwrap();
        // B 更近但 busy；A/C 位置与等级相同，按 id
        let stations = vec![
            station("C", 0.0, 0.05, LoadTier::Free, AvailabilityTier::Available),
            station("A", 0.0, 0.05, LoadTier::Free, AvailabilityTier::Available),
            station("B", 0.0, 0.01, LoadTier::Busy, AvailabilityTier::Available),
        ];
        let ranked = RecommendationEngine::rank(origin, &stations, 20.0).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|r| r.station.station_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "C", "B"]);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::NAN).is_err());
        let origin = GeoPoint::new(0.0, 0.0).unwrap();
        assert!(RecommendationEngine::rank(origin, &[], 0.0).is_err());
        assert!(RecommendationEngine::top_k(origin, &[], 5.0, 0).is_err());
    }
}
