// ==========================================
// 车辆合规管理系统 - 到期提醒调度器
// ==========================================
// 职责: 管理按车辆的到期提醒任务 + 每日巡检 / 每周周报周期任务
// 并发: 单一任务队列，arm/disarm/出队在同一把锁内完成；
//       任务执行（读目录、发通知）在锁外进行
// 红线: 同一 (车辆, 偏移) 最多一个待执行任务；
//       同一 (车辆, 偏移, 到期日) 最多投递一次
// ==========================================

use crate::config::SchedulerConfig;
use crate::domain::{StatusCounts, UserRole, Vehicle, VehicleFilter};
use crate::engine::clock::Clock;
use crate::engine::collaborators::{Directory, IdentityProvider};
use crate::engine::compliance_status::ComplianceStatusEngine;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::notifier::{dispatch_best_effort, NotificationDispatcher};
use crate::engine::reminder::job_queue::{DueJob, JobKey, JobQueue};
use crate::engine::reminder::messages;
use crate::engine::reminder::schedule::RecurringSchedule;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};

/// 每日巡检任务名
pub const DAILY_SWEEP_JOB: &str = "daily_compliance_check";
/// 每周周报任务名
pub const WEEKLY_DIGEST_JOB: &str = "weekly_compliance_digest";

const MAX_RECORDED_CONFLICTS: usize = 256;

// ==========================================
// 结果类型
// ==========================================

/// 已排期的提醒
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReminder {
    pub offset_days: i64,
    pub due_at: NaiveDateTime,
}

/// 同键任务被替换的记录（非错误，供审计/测试观察）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulingConflict {
    pub vehicle_id: String,
    pub offset_days: i64,
    pub previous_due: NaiveDateTime,
    pub new_due: NaiveDateTime,
    pub observed_at: NaiveDateTime,
}

/// arm 结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArmOutcome {
    pub scheduled: Vec<ScheduledReminder>,
    pub conflicts: Vec<SchedulingConflict>,
}

/// fire 结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FireOutcome {
    /// 通知已投递
    Delivered,
    /// 守卫通过但投递失败（已记录日志）
    DispatchFailed,
    /// 剩余天数与偏移不一致，丢弃
    Skipped,
    /// 同一到期日的该偏移已投递过
    AlreadySent,
    /// 车辆已不存在
    VehicleMissing,
}

/// 每日巡检报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub run_date: Option<NaiveDate>,
    pub vehicles_scanned: usize,
    pub statuses_updated: usize,
    pub reminders_sent: usize,
    pub dispatch_failures: usize,
    pub vehicles_rearmed: usize,
    pub failures: usize,
}

/// 周报报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DigestReport {
    pub counts: StatusCounts,
    pub recipients: usize,
    pub delivered: usize,
    pub dispatch_failures: usize,
}

/// 一轮到期任务执行报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub executed: usize,
    pub reminders_delivered: usize,
    pub failures: usize,
}

// ==========================================
// 内部状态
// ==========================================
#[derive(Debug, Default)]
struct SchedulerState {
    queue: JobQueue,
    recurring: HashMap<String, RecurringSchedule>,
    sent: HashSet<(String, i64, NaiveDate)>,
    /// 显式取消提醒的车辆；再次 arm 之前巡检不补发、不重排
    disarmed: HashSet<String>,
    conflicts: VecDeque<SchedulingConflict>,
}

impl SchedulerState {
    fn record_conflict(&mut self, conflict: SchedulingConflict) {
        if self.conflicts.len() >= MAX_RECORDED_CONFLICTS {
            self.conflicts.pop_front();
        }
        self.conflicts.push_back(conflict);
    }
}

// ==========================================
// ReminderScheduler
// ==========================================
pub struct ReminderScheduler {
    directory: Arc<dyn Directory>,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    offsets: Vec<i64>,
    reminder_time: NaiveTime,
    state: Mutex<SchedulerState>,
    wakeup: Notify,
}

impl ReminderScheduler {
    /// 创建调度器
    ///
    /// # 错误
    /// - InvalidInput: 配置不合法（偏移超出 1..=365、时刻越界等）
    pub fn new(
        directory: Arc<dyn Directory>,
        identity: Arc<dyn IdentityProvider>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> EngineResult<Self> {
        config.validate().map_err(EngineError::InvalidInput)?;
        let reminder_time = NaiveTime::from_hms_opt(config.reminder_hour, 0, 0).ok_or_else(|| {
            EngineError::InvalidInput(format!("reminder_hour 超出范围: {}", config.reminder_hour))
        })?;

        Ok(Self {
            directory,
            identity,
            dispatcher,
            clock,
            offsets: config.normalized_offsets(),
            config,
            reminder_time,
            state: Mutex::new(SchedulerState::default()),
            wakeup: Notify::new(),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// 提醒偏移（降序）
    pub fn offsets(&self) -> &[i64] {
        &self.offsets
    }

    fn lock_state(&self) -> EngineResult<MutexGuard<'_, SchedulerState>> {
        self.state
            .lock()
            .map_err(|e| EngineError::LockPoisoned(format!("调度器状态锁: {}", e)))
    }

    // ==========================================
    // 按车辆排期
    // ==========================================

    /// 为车辆排期到期提醒
    ///
    /// # 规则
    /// - 每个偏移 due = expiry - offset，在 due 当天 reminder_hour 触发
    /// - 触发时刻不晚于当前时间的偏移不排期，并取消该键上残留的旧任务
    /// - 同键已有任务时替换，并记录 SchedulingConflict
    pub fn arm(&self, vehicle_id: &str, expiry_date: NaiveDate) -> EngineResult<ArmOutcome> {
        let now = self.clock.now();
        let mut outcome = ArmOutcome::default();

        {
            let mut state = self.lock_state()?;
            state.disarmed.remove(vehicle_id);
            for &offset_days in &self.offsets {
                let key = JobKey::reminder(vehicle_id, offset_days);
                let due_at = (expiry_date - Duration::days(offset_days)).and_time(self.reminder_time);

                if due_at <= now {
                    if state.queue.cancel(&key) {
                        debug!(vehicle_id, offset_days, "提醒触发时刻已过，取消旧任务");
                    }
                    continue;
                }

                if let Some(previous_due) = state.queue.schedule(key, due_at) {
                    let conflict = SchedulingConflict {
                        vehicle_id: vehicle_id.to_string(),
                        offset_days,
                        previous_due,
                        new_due: due_at,
                        observed_at: now,
                    };
                    state.record_conflict(conflict.clone());
                    outcome.conflicts.push(conflict);
                }
                outcome.scheduled.push(ScheduledReminder { offset_days, due_at });
            }
        }

        if !outcome.scheduled.is_empty() {
            self.wakeup.notify_one();
        }

        debug!(
            vehicle_id,
            expiry_date = %expiry_date,
            scheduled = outcome.scheduled.len(),
            replaced = outcome.conflicts.len(),
            "车辆提醒已排期"
        );
        Ok(outcome)
    }

    /// 取消车辆的全部提醒，返回取消数量
    pub fn disarm(&self, vehicle_id: &str) -> EngineResult<usize> {
        let cancelled = {
            let mut state = self.lock_state()?;
            state.disarmed.insert(vehicle_id.to_string());
            state.queue.cancel_vehicle(vehicle_id)
        };
        debug!(vehicle_id, cancelled, "车辆提醒已取消");
        Ok(cancelled)
    }

    /// 按车辆当前到期日重排（无到期日则取消）
    pub fn sync_vehicle(&self, vehicle: &Vehicle) -> EngineResult<ArmOutcome> {
        match vehicle.expiry_date {
            Some(expiry) => self.arm(&vehicle.vehicle_id, expiry),
            None => {
                self.disarm(&vehicle.vehicle_id)?;
                Ok(ArmOutcome::default())
            }
        }
    }

    // ==========================================
    // 触发
    // ==========================================

    /// 执行一条到期提醒
    ///
    /// # 守卫
    /// - 车辆已被 disarm 时丢弃
    /// - 重新读取车辆，当前剩余天数必须等于 offset_days
    /// - 同一 (车辆, 偏移, 到期日) 只投递一次
    pub fn fire(&self, vehicle_id: &str, offset_days: i64) -> EngineResult<FireOutcome> {
        if self.lock_state()?.disarmed.contains(vehicle_id) {
            debug!(vehicle_id, offset_days, "车辆提醒已取消，丢弃提醒");
            return Ok(FireOutcome::Skipped);
        }

        let vehicle = match self.directory.get_vehicle(vehicle_id)? {
            Some(v) => v,
            None => {
                debug!(vehicle_id, offset_days, "车辆已删除，丢弃提醒");
                return Ok(FireOutcome::VehicleMissing);
            }
        };

        let today = self.clock.today();
        let expiry = match vehicle.expiry_date {
            Some(date) if ComplianceStatusEngine::days_to_expiry(Some(date), today) == Some(offset_days) && date >= today => date,
            _ => {
                debug!(vehicle_id, offset_days, "剩余天数与提醒偏移不一致，丢弃提醒");
                return Ok(FireOutcome::Skipped);
            }
        };

        self.deliver_reminder(&vehicle, offset_days, expiry)
    }

    /// 占用投递记录并发送提醒
    fn deliver_reminder(&self, vehicle: &Vehicle, offset_days: i64, expiry: NaiveDate) -> EngineResult<FireOutcome> {
        let claimed = self
            .lock_state()?
            .sent
            .insert((vehicle.vehicle_id.clone(), offset_days, expiry));
        if !claimed {
            debug!(vehicle_id = %vehicle.vehicle_id, offset_days, "提醒已投递过，跳过");
            return Ok(FireOutcome::AlreadySent);
        }

        let notification = messages::reminder_notification(vehicle, offset_days, expiry);
        if dispatch_best_effort(self.dispatcher.as_ref(), &notification, self.config.dispatch_max_retries) {
            info!(
                vehicle_id = %vehicle.vehicle_id,
                offset_days,
                owner_id = %vehicle.owner_id,
                "到期提醒已发送"
            );
            Ok(FireOutcome::Delivered)
        } else {
            Ok(FireOutcome::DispatchFailed)
        }
    }

    // ==========================================
    // 每日巡检
    // ==========================================

    /// 每日巡检
    ///
    /// # 流程
    /// 1. 遍历有到期日的车辆，重算并持久化缓存状态
    /// 2. 今天应发而计时器不会再触发的提醒直接发送
    /// 3. 无待执行提醒的车辆重新排期
    /// 4. 清理已过期的投递记录
    ///
    /// 单车失败只记录日志，继续处理下一辆
    pub fn run_daily_sweep(&self) -> EngineResult<SweepReport> {
        let today = self.clock.today();
        let vehicles = self.directory.list_vehicles(&VehicleFilter::with_expiry())?;
        let mut report = SweepReport {
            run_date: Some(today),
            vehicles_scanned: vehicles.len(),
            ..SweepReport::default()
        };

        for vehicle in &vehicles {
            if let Err(e) = self.sweep_vehicle(vehicle, today, &mut report) {
                report.failures += 1;
                error!(vehicle_id = %vehicle.vehicle_id, error = %e, "每日巡检处理车辆失败");
            }
        }

        self.lock_state()?
            .sent
            .retain(|(_, _, expiry)| *expiry >= today);

        info!(
            run_date = %today,
            scanned = report.vehicles_scanned,
            statuses_updated = report.statuses_updated,
            reminders_sent = report.reminders_sent,
            rearmed = report.vehicles_rearmed,
            failures = report.failures,
            "每日巡检完成"
        );
        Ok(report)
    }

    fn sweep_vehicle(&self, vehicle: &Vehicle, today: NaiveDate, report: &mut SweepReport) -> EngineResult<()> {
        let expiry = match vehicle.expiry_date {
            Some(date) => date,
            None => return Ok(()),
        };

        let status = ComplianceStatusEngine::derive(Some(expiry), today);
        if status != vehicle.compliance_status
            && self
                .directory
                .update_vehicle_status(&vehicle.vehicle_id, Some(expiry), status, self.clock.now())?
        {
            report.statuses_updated += 1;
            debug!(
                vehicle_id = %vehicle.vehicle_id,
                from = %vehicle.compliance_status,
                to = %status,
                "合规状态已更新"
            );
        }

        if self.lock_state()?.disarmed.contains(&vehicle.vehicle_id) {
            debug!(vehicle_id = %vehicle.vehicle_id, "车辆提醒已取消，巡检不补发");
            return Ok(());
        }

        let days_left = (expiry - today).num_days();
        if self.offsets.contains(&days_left) {
            let key = JobKey::reminder(&vehicle.vehicle_id, days_left);
            let now = self.clock.now();
            let timer_pending = {
                let mut state = self.lock_state()?;
                match state.queue.due_of(&key) {
                    Some(due) if due > now && due.date() == today => true,
                    Some(_) => {
                        state.queue.cancel(&key);
                        false
                    }
                    None => false,
                }
            };

            if !timer_pending {
                match self.deliver_reminder(vehicle, days_left, expiry)? {
                    FireOutcome::Delivered => report.reminders_sent += 1,
                    FireOutcome::DispatchFailed => report.dispatch_failures += 1,
                    _ => {}
                }
            }
        }

        let has_pending = self.lock_state()?.queue.has_pending_for_vehicle(&vehicle.vehicle_id);
        if !has_pending && !self.arm(&vehicle.vehicle_id, expiry)?.scheduled.is_empty() {
            report.vehicles_rearmed += 1;
        }

        Ok(())
    }

    // ==========================================
    // 每周周报
    // ==========================================

    /// 按状态汇总全部车辆，给每位管理员发送一条周报
    pub fn run_weekly_digest(&self) -> EngineResult<DigestReport> {
        let today = self.clock.today();
        let vehicles = self.directory.list_vehicles(&VehicleFilter::all())?;
        let counts: StatusCounts = vehicles
            .iter()
            .map(|v| ComplianceStatusEngine::derive(v.expiry_date, today))
            .collect();

        let admins = self.identity.list_by_role(UserRole::Admin)?;
        let mut report = DigestReport {
            counts,
            recipients: admins.len(),
            ..DigestReport::default()
        };

        for admin in &admins {
            let notification = messages::digest_notification(&admin.user_id, &counts, today);
            if dispatch_best_effort(self.dispatcher.as_ref(), &notification, self.config.dispatch_max_retries) {
                report.delivered += 1;
            } else {
                report.dispatch_failures += 1;
            }
        }

        if admins.is_empty() {
            warn!("无管理员账户，周报未发送");
        }
        info!(
            total = counts.total(),
            valid = counts.valid,
            expiring_soon = counts.expiring_soon,
            expired = counts.expired,
            delivered = report.delivered,
            "每周周报完成"
        );
        Ok(report)
    }

    // ==========================================
    // 周期任务
    // ==========================================

    /// 注册周期任务（同名替换计划），返回下一次触发时间
    pub fn register_recurring(&self, name: &str, schedule: RecurringSchedule) -> EngineResult<NaiveDateTime> {
        let next = schedule
            .next_after(self.clock.now())
            .ok_or_else(|| EngineError::InvalidInput(format!("周期任务时刻不合法: {} {}", name, schedule)))?;

        {
            let mut state = self.lock_state()?;
            state.recurring.insert(name.to_string(), schedule);
            state.queue.schedule(JobKey::Recurring(name.to_string()), next);
        }
        self.wakeup.notify_one();

        info!(job = name, schedule = %schedule, next_run = %next, "周期任务已注册");
        Ok(next)
    }

    /// 注册每日巡检与每周周报
    pub fn register_default_jobs(&self) -> EngineResult<()> {
        self.register_recurring(DAILY_SWEEP_JOB, RecurringSchedule::daily(self.config.daily_sweep_hour))?;
        self.register_recurring(
            WEEKLY_DIGEST_JOB,
            RecurringSchedule::weekly(self.config.weekly_digest_weekday, self.config.weekly_digest_hour),
        )?;
        Ok(())
    }

    /// 执行周期任务并排期下一次
    fn run_recurring(&self, name: &str, due_at: NaiveDateTime) -> EngineResult<()> {
        let result = match name {
            DAILY_SWEEP_JOB => self.run_daily_sweep().map(|_| ()),
            WEEKLY_DIGEST_JOB => self.run_weekly_digest().map(|_| ()),
            other => {
                warn!(job = other, "未知周期任务，忽略");
                Ok(())
            }
        };

        let after = due_at.max(self.clock.now());
        let mut state = self.lock_state()?;
        let key = JobKey::Recurring(name.to_string());
        if let Some(schedule) = state.recurring.get(name).copied() {
            if state.queue.due_of(&key).is_none() {
                if let Some(next) = schedule.next_after(after) {
                    state.queue.schedule(key, next);
                    debug!(job = name, next_run = %next, "周期任务已重新排期");
                }
            }
        }

        result
    }

    // ==========================================
    // 计时器驱动
    // ==========================================

    /// 弹出并执行所有已到期任务
    ///
    /// 出队在锁内完成，执行在锁外
    pub fn run_pending(&self) -> EngineResult<RunReport> {
        let now = self.clock.now();
        let due = self.lock_state()?.queue.pop_due(now);
        let mut report = RunReport::default();

        for DueJob { key, due_at } in due {
            report.executed += 1;
            let result = match &key {
                JobKey::Reminder { vehicle_id, offset_days } => self.fire(vehicle_id, *offset_days).map(|outcome| {
                    if outcome == FireOutcome::Delivered {
                        report.reminders_delivered += 1;
                    }
                }),
                JobKey::Recurring(name) => self.run_recurring(name, due_at),
            };

            if let Err(e) = result {
                report.failures += 1;
                error!(job = ?key, error = %e, "定时任务执行失败");
            }
        }

        Ok(report)
    }

    /// 启动恢复：为全部有到期日的车辆重新排期
    pub fn restore_from_directory(&self) -> EngineResult<usize> {
        let vehicles = self.directory.list_vehicles(&VehicleFilter::with_expiry())?;
        let mut armed = 0;
        for vehicle in &vehicles {
            if let Some(expiry) = vehicle.expiry_date {
                if !self.arm(&vehicle.vehicle_id, expiry)?.scheduled.is_empty() {
                    armed += 1;
                }
            }
        }
        info!(vehicles = vehicles.len(), armed, "提醒任务已从目录恢复");
        Ok(armed)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 最早的待执行任务时间
    pub fn next_wakeup(&self) -> EngineResult<Option<NaiveDateTime>> {
        Ok(self.lock_state()?.queue.next_due())
    }

    /// 车辆的待执行提醒（偏移降序）
    pub fn pending_reminders(&self, vehicle_id: &str) -> EngineResult<Vec<ScheduledReminder>> {
        Ok(self
            .lock_state()?
            .queue
            .pending_for_vehicle(vehicle_id)
            .into_iter()
            .map(|(offset_days, due_at)| ScheduledReminder { offset_days, due_at })
            .collect())
    }

    /// 全部待执行任务数（含周期任务）
    pub fn pending_count(&self) -> EngineResult<usize> {
        Ok(self.lock_state()?.queue.len())
    }

    /// 最近的同键替换记录
    pub fn scheduling_conflicts(&self) -> EngineResult<Vec<SchedulingConflict>> {
        Ok(self.lock_state()?.conflicts.iter().cloned().collect())
    }

    // ==========================================
    // 服务循环
    // ==========================================

    /// 计时服务主循环
    ///
    /// 休眠到下一个到期任务或轮询间隔（取较早者）；有新任务排期时提前唤醒；
    /// shutdown 置为 true 或发送端关闭时退出
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(poll_interval_secs = self.config.poll_interval_secs, "提醒调度服务启动");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let worker = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || worker.run_pending()).await {
                Ok(Ok(report)) if report.executed > 0 => {
                    debug!(
                        executed = report.executed,
                        delivered = report.reminders_delivered,
                        failures = report.failures,
                        "到期任务执行完成"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(error = %e, "到期任务执行失败"),
                Err(e) => error!(error = %e, "到期任务执行线程异常"),
            }

            let sleep_for = self.sleep_duration();
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.wakeup.notified() => {
                    debug!("新任务排期，提前唤醒");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("提醒调度服务停止");
    }

    fn sleep_duration(&self) -> std::time::Duration {
        let poll = std::time::Duration::from_secs(self.config.poll_interval_secs);
        let next = match self.next_wakeup() {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "读取下一任务时间失败，按轮询间隔休眠");
                None
            }
        };

        match next {
            Some(due) => (due - self.clock.now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO)
                .min(poll),
            None => poll,
        }
    }
}
