// ==========================================
// 车辆合规管理系统 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎，不拼 SQL
// 红线: 引擎只通过 Directory / IdentityProvider / NotificationDispatcher 访问外部
// ==========================================

pub mod clock;
pub mod collaborators;
pub mod compliance_status;
pub mod error;
pub mod load_tracker;
pub mod notifier;
pub mod recommendation;
pub mod reminder;

// 重导出核心引擎
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{Directory, IdentityProvider};
pub use compliance_status::ComplianceStatusEngine;
pub use error::{EngineError, EngineResult};
pub use load_tracker::LoadTracker;
pub use notifier::{dispatch_best_effort, DispatchError, NotificationDispatcher, OutgoingNotification};
pub use recommendation::{GeoPoint, RankedStation, RecommendationEngine};
pub use reminder::{
    ArmOutcome, DigestReport, FireOutcome, RecurringSchedule, ReminderScheduler, ScheduledReminder,
    SchedulingConflict, SweepReport,
};
