// ==========================================
// 车辆合规管理系统 - 站点 API
// ==========================================
// 职责: 站点推荐、负载查询、供应状态维护、审批、评价
// 红线: 常规更新路径不得写负载等级；负载覆写仅限管理员
// ==========================================

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{
    require_admin, require_station_operator, validate_coordinates, validate_radius,
    validate_rating, validate_top_k,
};
use crate::config::RecommendationConfig;
use crate::domain::{Actor, AvailabilityTier, LoadTier, RatingSummary, Station, StationRating};
use crate::engine::{
    Clock, Directory, IdentityProvider, LoadTracker, RankedStation, RecommendationEngine,
};

// ==========================================
// StationApi
// ==========================================
pub struct StationApi {
    directory: Arc<dyn Directory>,
    identity: Arc<dyn IdentityProvider>,
    load_tracker: Arc<LoadTracker>,
    clock: Arc<dyn Clock>,
    recommendation: RecommendationConfig,
}

impl StationApi {
    pub fn new(
        directory: Arc<dyn Directory>,
        identity: Arc<dyn IdentityProvider>,
        load_tracker: Arc<LoadTracker>,
        clock: Arc<dyn Clock>,
        recommendation: RecommendationConfig,
    ) -> Self {
        Self {
            directory,
            identity,
            load_tracker,
            clock,
            recommendation,
        }
    }

    fn load_station(&self, station_id: &str) -> ApiResult<Station> {
        self.directory
            .get_station(station_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Station(id={})不存在", station_id)))
    }

    fn resolve_actor(&self, user_id: &str) -> ApiResult<Actor> {
        self.identity
            .resolve(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("User(id={})不存在", user_id)))
    }

    /// 附近站点推荐
    ///
    /// # 参数
    /// - radius_km: None 时取配置默认值（20km）
    /// - top_k: None 时取配置默认值（3）
    ///
    /// 仅启用且已审批的站点参与排序
    pub fn rank_stations(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: Option<f64>,
        top_k: Option<usize>,
    ) -> ApiResult<Vec<RankedStation>> {
        let origin = validate_coordinates(latitude, longitude)?;
        let radius_km = validate_radius(radius_km.unwrap_or(self.recommendation.default_radius_km))?;
        let top_k = validate_top_k(top_k.unwrap_or(self.recommendation.default_top_k))?;

        let candidates: Vec<Station> = self
            .directory
            .list_active_stations()?
            .into_iter()
            .filter(Station::is_operational)
            .collect();

        let ranked = RecommendationEngine::top_k(origin, &candidates, radius_km, top_k)?;
        info!(
            latitude,
            longitude,
            radius_km,
            candidates = candidates.len(),
            returned = ranked.len(),
            "站点推荐完成"
        );
        Ok(ranked)
    }

    /// 站点当前负载（按当前时间重算，衰减时回写）
    pub fn station_load(&self, station_id: &str) -> ApiResult<LoadTier> {
        Ok(self.load_tracker.refresh_station(station_id, self.clock.now())?)
    }

    /// 更新供应状态与营业开关（常规路径，不触碰负载等级）
    ///
    /// # 权限
    /// - 管理员：任意站点
    /// - 站点运营人员：仅本人站点
    pub fn update_station_availability(
        &self,
        actor_id: &str,
        station_id: &str,
        availability: AvailabilityTier,
        is_open: Option<bool>,
    ) -> ApiResult<Station> {
        let actor = self.resolve_actor(actor_id)?;
        require_station_operator(&actor, "更新站点供应状态")?;

        let station = self.load_station(station_id)?;
        if !actor.is_admin() && station.owner_id != actor.user_id {
            return Err(ApiError::Forbidden(format!(
                "站点{}不属于用户{}",
                station_id, actor.user_id
            )));
        }

        // 只写供应列，负载等级由 LoadTracker 维护
        self.directory
            .update_station_availability(station_id, availability, is_open, self.clock.now())?;
        let station = self.load_station(station_id)?;

        info!(station_id, availability = %availability, is_open = station.is_open, "站点供应状态已更新");
        Ok(station)
    }

    /// 管理员覆写负载等级（下一次检查登记时会被重新计算）
    pub fn override_station_load(&self, actor_id: &str, station_id: &str, load: LoadTier) -> ApiResult<Station> {
        let actor = self.resolve_actor(actor_id)?;
        require_admin(&actor, "覆写站点负载")?;

        let previous = self.load_station(station_id)?.load;
        self.directory
            .update_station_load(station_id, load, self.clock.now())?;
        let station = self.load_station(station_id)?;

        warn!(station_id, actor_id, from = %previous, to = %load, "站点负载已被管理员覆写");
        Ok(station)
    }

    /// 审批站点
    pub fn approve_station(&self, actor_id: &str, station_id: &str, notes: Option<String>) -> ApiResult<Station> {
        let actor = self.resolve_actor(actor_id)?;
        require_admin(&actor, "审批站点")?;

        self.load_station(station_id)?;
        self.directory
            .approve_station(station_id, self.clock.now(), notes.as_deref())?;
        let station = self.load_station(station_id)?;

        info!(station_id, actor_id, "站点已审批");
        Ok(station)
    }

    /// 评价站点（同一评价人覆盖旧评价）
    ///
    /// # 错误
    /// - InvalidInput: 任一评分不在 1-5
    pub fn rate_station(
        &self,
        rater_id: &str,
        station_id: &str,
        compliance_strictness: u8,
        waiting_time: u8,
        service_quality: u8,
        review: Option<String>,
    ) -> ApiResult<StationRating> {
        let compliance_strictness = validate_rating("compliance_strictness", compliance_strictness)?;
        let waiting_time = validate_rating("waiting_time", waiting_time)?;
        let service_quality = validate_rating("service_quality", service_quality)?;

        let rater = self.resolve_actor(rater_id)?;
        self.load_station(station_id)?;

        let overall_rating =
            (compliance_strictness as f64 + waiting_time as f64 + service_quality as f64) / 3.0;
        let rating = StationRating {
            station_id: station_id.to_string(),
            rater_id: rater.user_id,
            compliance_strictness,
            waiting_time,
            service_quality,
            overall_rating,
            review,
            created_at: self.clock.now(),
        };
        self.directory.save_rating(&rating)?;

        info!(station_id, rater_id, overall_rating, "站点评价已保存");
        Ok(rating)
    }

    /// 站点评价汇总
    pub fn station_rating_summary(&self, station_id: &str) -> ApiResult<RatingSummary> {
        self.load_station(station_id)?;
        let ratings = self.directory.list_ratings(station_id)?;
        Ok(RatingSummary::from_ratings(station_id, &ratings))
    }
}
