// ==========================================
// 车辆合规管理系统 - 合规 API
// ==========================================
// 职责: 合规检查登记、证书到期日维护、车辆删除、状态/历史/统计查询
// 红线: 检查记录与状态写入是事实来源，通知投递失败不回滚
// ==========================================

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{require_station_operator, validate_days, validate_limit};
use crate::domain::{
    CheckFilter, CheckMethod, ComplianceCheck, ComplianceStatus, DailyTrend, StatusCounts, Vehicle,
};
use crate::engine::{
    Clock, ComplianceStatusEngine, Directory, IdentityProvider, LoadTracker, ReminderScheduler,
    ScheduledReminder,
};

// ==========================================
// 视图对象
// ==========================================

/// 车辆合规状态视图（强制重算）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleStatusView {
    pub vehicle_id: String,
    pub plate_number: String,
    pub expiry_date: Option<NaiveDate>,
    pub status: ComplianceStatus,
    pub days_to_expiry: Option<i64>,
    /// 缓存状态已过期并被回写
    pub refreshed: bool,
    pub pending_reminders: Vec<ScheduledReminder>,
}

/// 站点检查统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationComplianceStats {
    pub station_id: String,
    pub total_checks: usize,
    pub counts: StatusCounts,
    pub compliance_rate_pct: f64,
}

// ==========================================
// ComplianceApi
// ==========================================
pub struct ComplianceApi {
    directory: Arc<dyn Directory>,
    identity: Arc<dyn IdentityProvider>,
    scheduler: Arc<ReminderScheduler>,
    load_tracker: Arc<LoadTracker>,
    clock: Arc<dyn Clock>,
    /// 串行化到期日写入与提醒重排
    expiry_lock: Mutex<()>,
}

impl ComplianceApi {
    pub fn new(
        directory: Arc<dyn Directory>,
        identity: Arc<dyn IdentityProvider>,
        scheduler: Arc<ReminderScheduler>,
        load_tracker: Arc<LoadTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            identity,
            scheduler,
            load_tracker,
            clock,
            expiry_lock: Mutex::new(()),
        }
    }

    fn lock_expiry(&self) -> ApiResult<MutexGuard<'_, ()>> {
        self.expiry_lock
            .lock()
            .map_err(|e| ApiError::InternalError(format!("到期日锁: {}", e)))
    }

    fn load_vehicle(&self, vehicle_id: &str) -> ApiResult<Vehicle> {
        self.directory
            .get_vehicle(vehicle_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Vehicle(id={})不存在", vehicle_id)))
    }

    /// 登记一次合规检查
    ///
    /// # 副作用
    /// 1. 持久化检查记录（状态快照）
    /// 2. 回写车辆缓存状态（仅状态列，到期日被并发修改时跳过）
    /// 3. 记录站点负载并回写负载等级
    ///
    /// 检查不改变到期日，提醒不在此重排
    ///
    /// # 错误
    /// - NotFound: 车辆/站点/操作人不存在
    /// - Forbidden: 操作人不是站点运营人员或管理员
    /// - BusinessRuleViolation: 站点未启用或未审批
    pub fn record_compliance_check(
        &self,
        vehicle_id: &str,
        station_id: &str,
        actor_id: &str,
        method: CheckMethod,
        note: Option<String>,
    ) -> ApiResult<ComplianceCheck> {
        let actor = self
            .identity
            .resolve(actor_id)?
            .ok_or_else(|| ApiError::NotFound(format!("User(id={})不存在", actor_id)))?;
        require_station_operator(&actor, "登记合规检查")?;

        let vehicle = self.load_vehicle(vehicle_id)?;
        let station = self
            .directory
            .get_station(station_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Station(id={})不存在", station_id)))?;
        if !station.is_operational() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "站点{}未启用或未审批，不能登记检查",
                station_id
            )));
        }

        let now = self.clock.now();
        let status = ComplianceStatusEngine::derive(vehicle.expiry_date, now.date());
        let check = ComplianceCheck {
            check_id: Uuid::new_v4().to_string(),
            vehicle_id: vehicle.vehicle_id.clone(),
            station_id: station.station_id.clone(),
            actor_id: actor.user_id.clone(),
            method,
            status,
            note,
            checked_at: now,
        };
        self.directory.save_check(&check)?;

        if vehicle.compliance_status != status
            && !self
                .directory
                .update_vehicle_status(&vehicle.vehicle_id, vehicle.expiry_date, status, now)?
        {
            debug!(vehicle_id, "到期日已被并发修改，跳过状态回写");
        }

        let load = self.load_tracker.record_check(&station.station_id, now)?;

        info!(
            check_id = %check.check_id,
            vehicle_id = %vehicle.vehicle_id,
            station_id = %station.station_id,
            status = %status,
            load = %load,
            "合规检查已登记"
        );
        Ok(check)
    }

    /// 设置证书到期日（None 表示清除）
    ///
    /// # 副作用
    /// - 重算并持久化缓存状态
    /// - 有到期日时重排提醒，清除时取消全部提醒
    pub fn set_vehicle_expiry(&self, vehicle_id: &str, new_expiry_date: Option<NaiveDate>) -> ApiResult<Vehicle> {
        let _guard = self.lock_expiry()?;
        let mut vehicle = self.load_vehicle(vehicle_id)?;
        let now = self.clock.now();

        vehicle.expiry_date = new_expiry_date;
        vehicle.compliance_status = ComplianceStatusEngine::derive(new_expiry_date, now.date());
        vehicle.updated_at = now;
        self.directory.save_vehicle(&vehicle)?;

        let outcome = self.scheduler.sync_vehicle(&vehicle)?;
        info!(
            vehicle_id,
            expiry_date = ?new_expiry_date,
            status = %vehicle.compliance_status,
            reminders = outcome.scheduled.len(),
            "车辆到期日已更新"
        );
        Ok(vehicle)
    }

    /// 删除车辆（检查记录级联删除，提醒取消）
    pub fn delete_vehicle(&self, vehicle_id: &str) -> ApiResult<()> {
        let _guard = self.lock_expiry()?;
        if !self.directory.delete_vehicle(vehicle_id)? {
            return Err(ApiError::NotFound(format!("Vehicle(id={})不存在", vehicle_id)));
        }
        let cancelled = self.scheduler.disarm(vehicle_id)?;
        info!(vehicle_id, cancelled_reminders = cancelled, "车辆已删除");
        Ok(())
    }

    /// 读取车辆状态（强制重算，缓存过期时回写）
    pub fn vehicle_status(&self, vehicle_id: &str) -> ApiResult<VehicleStatusView> {
        let vehicle = self.load_vehicle(vehicle_id)?;
        let now = self.clock.now();
        let today = now.date();
        let status = ComplianceStatusEngine::derive(vehicle.expiry_date, today);

        let refreshed = status != vehicle.compliance_status
            && self
                .directory
                .update_vehicle_status(vehicle_id, vehicle.expiry_date, status, now)?;
        if refreshed {
            debug!(vehicle_id, from = %vehicle.compliance_status, to = %status, "缓存状态过期，回写");
        }

        Ok(VehicleStatusView {
            vehicle_id: vehicle.vehicle_id.clone(),
            plate_number: vehicle.plate_number.clone(),
            expiry_date: vehicle.expiry_date,
            status,
            days_to_expiry: ComplianceStatusEngine::days_to_expiry(vehicle.expiry_date, today),
            refreshed,
            pending_reminders: self.scheduler.pending_reminders(vehicle_id)?,
        })
    }

    /// 车辆最近 N 条检查记录（最新在前）
    pub fn compliance_history(&self, vehicle_id: &str, limit: usize) -> ApiResult<Vec<ComplianceCheck>> {
        let limit = validate_limit(limit)?;
        self.load_vehicle(vehicle_id)?;
        Ok(self
            .directory
            .list_checks(&CheckFilter::for_vehicle(vehicle_id).limit(limit))?)
    }

    /// 站点检查按状态统计
    pub fn station_compliance_stats(&self, station_id: &str) -> ApiResult<StationComplianceStats> {
        if self.directory.get_station(station_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Station(id={})不存在", station_id)));
        }

        let checks = self.directory.list_checks(&CheckFilter::for_station(station_id))?;
        let counts: StatusCounts = checks.iter().map(|c| c.status).collect();
        Ok(StationComplianceStats {
            station_id: station_id.to_string(),
            total_checks: checks.len(),
            counts,
            compliance_rate_pct: counts.compliance_rate_pct(),
        })
    }

    /// 最近 days 天（含今天）每日检查趋势，可按站点过滤
    pub fn compliance_trends(&self, station_id: Option<&str>, days: i64) -> ApiResult<Vec<DailyTrend>> {
        let days = validate_days(days)?;
        let start = self.clock.today() - Duration::days(days - 1);
        let since = start.and_hms_opt(0, 0, 0).ok_or_else(|| {
            ApiError::InternalError(format!("无法构造统计起点: {}", start))
        })?;

        let filter = match station_id {
            Some(id) => CheckFilter::for_station(id),
            None => CheckFilter::default(),
        };
        let checks = self.directory.list_checks(&filter.since(since))?;
        Ok(DailyTrend::aggregate(&checks))
    }
}
