// ==========================================
// 车辆合规管理系统 - 到期提醒子系统
// ==========================================
// 职责: 任务队列、周期计划、消息组装、调度器
// ==========================================

pub mod job_queue;
pub mod messages;
pub mod schedule;
pub mod scheduler;

pub use job_queue::{JobKey, JobQueue};
pub use schedule::RecurringSchedule;
pub use scheduler::{
    ArmOutcome, DigestReport, FireOutcome, ReminderScheduler, RunReport, ScheduledReminder,
    SchedulingConflict, SweepReport, DAILY_SWEEP_JOB, WEEKLY_DIGEST_JOB,
};
