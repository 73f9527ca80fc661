// ==========================================
// 车辆合规管理系统 - 输入校验
// ==========================================
// 职责: API 入口参数校验（越界直接返回 InvalidInput，不做静默截断）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::Actor;
use crate::engine::recommendation::GeoPoint;

/// 评分项取值范围
pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 5;

/// 趋势统计最长天数
pub const MAX_TREND_DAYS: i64 = 365;

/// 查询结果最大条数
pub const MAX_HISTORY_LIMIT: usize = 500;

/// 校验坐标
pub fn validate_coordinates(latitude: f64, longitude: f64) -> ApiResult<GeoPoint> {
    Ok(GeoPoint::new(latitude, longitude)?)
}

/// 校验搜索半径（有限正数）
pub fn validate_radius(radius_km: f64) -> ApiResult<f64> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(ApiError::InvalidInput(format!("搜索半径必须为正数: {}", radius_km)));
    }
    Ok(radius_km)
}

/// 校验 Top-K
pub fn validate_top_k(top_k: usize) -> ApiResult<usize> {
    if top_k == 0 {
        return Err(ApiError::InvalidInput("top_k 必须大于 0".to_string()));
    }
    Ok(top_k)
}

/// 校验单项评分（1-5）
pub fn validate_rating(field: &str, value: u8) -> ApiResult<u8> {
    if !(RATING_MIN..=RATING_MAX).contains(&value) {
        return Err(ApiError::InvalidInput(format!(
            "{} 超出范围: {} (允许 {}-{})",
            field, value, RATING_MIN, RATING_MAX
        )));
    }
    Ok(value)
}

/// 校验统计天数（1..=365）
pub fn validate_days(days: i64) -> ApiResult<i64> {
    if !(1..=MAX_TREND_DAYS).contains(&days) {
        return Err(ApiError::InvalidInput(format!(
            "天数超出范围: {} (允许 1-{})",
            days, MAX_TREND_DAYS
        )));
    }
    Ok(days)
}

/// 校验查询条数（1..=500）
pub fn validate_limit(limit: usize) -> ApiResult<usize> {
    if limit == 0 || limit > MAX_HISTORY_LIMIT {
        return Err(ApiError::InvalidInput(format!(
            "查询条数超出范围: {} (允许 1-{})",
            limit, MAX_HISTORY_LIMIT
        )));
    }
    Ok(limit)
}

/// 要求管理员
pub fn require_admin(actor: &Actor, action: &str) -> ApiResult<()> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "{} 仅限管理员 (user_id={}, role={})",
            action, actor.user_id, actor.role
        )))
    }
}

/// 要求管理员或站点运营人员
pub fn require_station_operator(actor: &Actor, action: &str) -> ApiResult<()> {
    if actor.can_operate_stations() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "{} 仅限站点运营人员或管理员 (user_id={}, role={})",
            action, actor.user_id, actor.role
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserRole;

    #[test]
    fn test_ranges() {
        assert!(validate_rating("waiting_time", 0).is_err());
        assert!(validate_rating("waiting_time", 5).is_ok());
        assert!(validate_days(0).is_err());
        assert!(validate_days(365).is_ok());
        assert!(validate_radius(-1.0).is_err());
        assert!(validate_radius(f64::INFINITY).is_err());
        assert!(validate_coordinates(0.0, 181.0).is_err());
        assert!(validate_limit(501).is_err());
    }

    #[test]
    fn test_role_gates() {
        let owner = Actor {
            user_id: "U1".to_string(),
            display_name: "u".to_string(),
            role: UserRole::VehicleOwner,
        };
        assert!(matches!(require_admin(&owner, "x"), Err(ApiError::Forbidden(_))));
        assert!(require_station_operator(&owner, "x").is_err());
    }
}
