// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、测试环境组装、种子数据、记录型/失败型通知投递
// ==========================================

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use fuellens_core::api::{ComplianceApi, StationApi};
use fuellens_core::config::{LoadConfig, RecommendationConfig, SchedulerConfig};
use fuellens_core::db::{init_schema, open_sqlite_connection};
use fuellens_core::domain::{
    AvailabilityTier, CheckFilter, ComplianceCheck, ComplianceStatus, LoadTier,
    NotificationCategory, Station, StationRating, User, UserRole, Vehicle, VehicleFilter,
    VehicleType,
};
use fuellens_core::engine::{
    Clock, DispatchError, Directory, IdentityProvider, LoadTracker, ManualClock,
    NotificationDispatcher, ReminderScheduler,
};
use fuellens_core::repository::{RepositoryResult, SqliteDirectory, UserRepository};
use rusqlite::Connection;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

pub const ADMIN_1: &str = "ADMIN1";
pub const ADMIN_2: &str = "ADMIN2";
pub const OPERATOR_1: &str = "OP1";
pub const OPERATOR_2: &str = "OP2";
pub const OWNER_1: &str = "OWNER1";

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, 0).unwrap()
}

/// 固定的“今天”：2026-06-01（周一）
pub fn base_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
}

// ==========================================
// 通知投递替身
// ==========================================

/// 记录型投递者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
}

#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        category: NotificationCategory,
    ) -> Result<(), DispatchError> {
        self.sent.lock().unwrap().push(SentNotification {
            user_id: user_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            category,
        });
        Ok(())
    }
}

/// 永远失败的投递者
#[derive(Default)]
pub struct FailingDispatcher {
    pub attempts: AtomicUsize,
}

impl FailingDispatcher {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationDispatcher for FailingDispatcher {
    fn notify(&self, _: &str, _: &str, _: &str, _: NotificationCategory) -> Result<(), DispatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DispatchError::Unavailable("gateway down".to_string()))
    }
}

// ==========================================
// 交错目录: 在读写之间插入另一操作
// ==========================================

type Hook = Box<dyn FnOnce() + Send>;

/// 委托给 SqliteDirectory，并在指定调用点执行一次钩子
pub struct InterleavingDirectory {
    inner: Arc<SqliteDirectory>,
    before_save_check: Mutex<Option<Hook>>,
    after_get_station: Mutex<Option<Hook>>,
}

impl InterleavingDirectory {
    pub fn new(inner: Arc<SqliteDirectory>) -> Self {
        Self {
            inner,
            before_save_check: Mutex::new(None),
            after_get_station: Mutex::new(None),
        }
    }

    /// 检查记录写入前执行
    pub fn before_save_check(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_save_check.lock().unwrap() = Some(Box::new(hook));
    }

    /// 站点读取后执行（调用方拿到的是钩子执行前的快照）
    pub fn after_get_station(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_get_station.lock().unwrap() = Some(Box::new(hook));
    }

    fn take(slot: &Mutex<Option<Hook>>) -> Option<Hook> {
        slot.lock().unwrap().take()
    }
}

impl Directory for InterleavingDirectory {
    fn get_vehicle(&self, vehicle_id: &str) -> RepositoryResult<Option<Vehicle>> {
        self.inner.get_vehicle(vehicle_id)
    }

    fn list_vehicles(&self, filter: &VehicleFilter) -> RepositoryResult<Vec<Vehicle>> {
        self.inner.list_vehicles(filter)
    }

    fn save_vehicle(&self, vehicle: &Vehicle) -> RepositoryResult<()> {
        self.inner.save_vehicle(vehicle)
    }

    fn update_vehicle_status(
        &self,
        vehicle_id: &str,
        expected_expiry: Option<NaiveDate>,
        status: ComplianceStatus,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        self.inner
            .update_vehicle_status(vehicle_id, expected_expiry, status, at)
    }

    fn delete_vehicle(&self, vehicle_id: &str) -> RepositoryResult<bool> {
        self.inner.delete_vehicle(vehicle_id)
    }

    fn get_station(&self, station_id: &str) -> RepositoryResult<Option<Station>> {
        let station = self.inner.get_station(station_id)?;
        if let Some(hook) = Self::take(&self.after_get_station) {
            hook();
        }
        Ok(station)
    }

    fn list_active_stations(&self) -> RepositoryResult<Vec<Station>> {
        self.inner.list_active_stations()
    }

    fn save_station(&self, station: &Station) -> RepositoryResult<()> {
        self.inner.save_station(station)
    }

    fn update_station_load(&self, station_id: &str, load: LoadTier, at: NaiveDateTime) -> RepositoryResult<bool> {
        self.inner.update_station_load(station_id, load, at)
    }

    fn update_station_availability(
        &self,
        station_id: &str,
        availability: AvailabilityTier,
        is_open: Option<bool>,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        self.inner
            .update_station_availability(station_id, availability, is_open, at)
    }

    fn approve_station(&self, station_id: &str, at: NaiveDateTime, notes: Option<&str>) -> RepositoryResult<bool> {
        self.inner.approve_station(station_id, at, notes)
    }

    fn save_check(&self, check: &ComplianceCheck) -> RepositoryResult<()> {
        if let Some(hook) = Self::take(&self.before_save_check) {
            hook();
        }
        self.inner.save_check(check)
    }

    fn list_checks(&self, filter: &CheckFilter) -> RepositoryResult<Vec<ComplianceCheck>> {
        self.inner.list_checks(filter)
    }

    fn save_rating(&self, rating: &StationRating) -> RepositoryResult<()> {
        self.inner.save_rating(rating)
    }

    fn list_ratings(&self, station_id: &str) -> RepositoryResult<Vec<StationRating>> {
        self.inner.list_ratings(station_id)
    }
}

// ==========================================
// TestEnv - 测试环境
// ==========================================
pub struct TestEnv {
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub clock: Arc<ManualClock>,
    pub directory: Arc<SqliteDirectory>,
    pub users: Arc<UserRepository>,
    pub outbox: Arc<RecordingDispatcher>,
    pub scheduler: Arc<ReminderScheduler>,
    pub load_tracker: Arc<LoadTracker>,
    pub compliance_api: ComplianceApi,
    pub station_api: StationApi,
}

impl TestEnv {
    /// 记录型投递，时钟起点 start
    pub fn new(start: NaiveDateTime) -> Self {
        let outbox = Arc::new(RecordingDispatcher::default());
        Self::build(start, outbox.clone(), outbox)
    }

    /// 指定投递者（outbox 不会收到任何通知）
    pub fn with_dispatcher(start: NaiveDateTime, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self::build(start, dispatcher, Arc::new(RecordingDispatcher::default()))
    }

    fn build(
        start: NaiveDateTime,
        dispatcher: Arc<dyn NotificationDispatcher>,
        outbox: Arc<RecordingDispatcher>,
    ) -> Self {
        fuellens_core::logging::init_test();
        let (temp_file, db_path) = create_test_db().unwrap();
        let conn = Arc::new(Mutex::new(open_sqlite_connection(&db_path).unwrap()));
        let clock = Arc::new(ManualClock::new(start));
        let dyn_clock: Arc<dyn Clock> = clock.clone();

        let directory = Arc::new(SqliteDirectory::from_connection(conn.clone()));
        let users = Arc::new(UserRepository::from_connection(conn.clone()));
        let dyn_directory: Arc<dyn Directory> = directory.clone();
        let identity: Arc<dyn IdentityProvider> = users.clone();

        let scheduler = Arc::new(
            ReminderScheduler::new(
                dyn_directory.clone(),
                identity.clone(),
                dispatcher,
                dyn_clock.clone(),
                SchedulerConfig::default(),
            )
            .unwrap(),
        );
        let load_tracker = Arc::new(LoadTracker::new(dyn_directory.clone(), LoadConfig::default()).unwrap());

        let compliance_api = ComplianceApi::new(
            dyn_directory.clone(),
            identity.clone(),
            scheduler.clone(),
            load_tracker.clone(),
            dyn_clock.clone(),
        );
        let station_api = StationApi::new(
            dyn_directory,
            identity,
            load_tracker.clone(),
            dyn_clock,
            RecommendationConfig::default(),
        );

        let env = Self {
            _temp_file: temp_file,
            db_path,
            conn,
            clock,
            directory,
            users,
            outbox,
            scheduler,
            load_tracker,
            compliance_api,
            station_api,
        };
        env.seed_users();
        env
    }

    // ==========================================
    // 种子数据
    // ==========================================

    fn seed_users(&self) {
        for (id, role) in [
            (ADMIN_1, UserRole::Admin),
            (ADMIN_2, UserRole::Admin),
            (OPERATOR_1, UserRole::StationOperator),
            (OPERATOR_2, UserRole::StationOperator),
            (OWNER_1, UserRole::VehicleOwner),
        ] {
            self.users
                .create_user(&User {
                    user_id: id.to_string(),
                    display_name: id.to_lowercase(),
                    email: Some(format!("{}@example.com", id.to_lowercase())),
                    role,
                })
                .unwrap();
        }
    }

    /// 插入车辆（不经过 arm）
    pub fn seed_vehicle(&self, vehicle_id: &str, plate: &str, expiry: Option<NaiveDate>) -> Vehicle {
        let now = self.clock.now();
        let vehicle = Vehicle {
            vehicle_id: vehicle_id.to_string(),
            plate_number: plate.to_string(),
            owner_id: OWNER_1.to_string(),
            vehicle_type: VehicleType::Car,
            test_date: None,
            expiry_date: expiry,
            compliance_status: ComplianceStatus::Valid,
            created_at: now,
            updated_at: now,
        };
        self.directory.save_vehicle(&vehicle).unwrap();
        vehicle
    }

    /// 插入已启用、已审批的站点
    pub fn seed_station(
        &self,
        station_id: &str,
        coords: Option<(f64, f64)>,
        load: LoadTier,
        availability: AvailabilityTier,
    ) -> Station {
        let station = Station {
            station_id: station_id.to_string(),
            name: format!("Station {}", station_id),
            owner_id: OPERATOR_1.to_string(),
            address: "Ring Road".to_string(),
            city: "Delhi".to_string(),
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            is_active: true,
            is_open: true,
            is_approved: true,
            approved_at: Some(self.clock.now()),
            approval_notes: None,
            load,
            availability,
            updated_at: self.clock.now(),
        };
        self.directory.save_station(&station).unwrap();
        station
    }

    pub fn station(&self, station_id: &str) -> Station {
        self.directory.get_station(station_id).unwrap().unwrap()
    }

    pub fn vehicle(&self, vehicle_id: &str) -> Vehicle {
        self.directory.get_vehicle(vehicle_id).unwrap().unwrap()
    }

    /// 另一个直连目录的合规 API（可移入钩子）
    pub fn shared_compliance_api(&self) -> Arc<ComplianceApi> {
        Arc::new(ComplianceApi::new(
            self.directory.clone(),
            self.users.clone(),
            self.scheduler.clone(),
            self.load_tracker.clone(),
            self.clock.clone(),
        ))
    }

    /// 基于交错目录组装 API，共享本环境的调度器、负载跟踪与时钟
    pub fn interleaved_apis(&self) -> (Arc<InterleavingDirectory>, ComplianceApi, StationApi) {
        let interleaving = Arc::new(InterleavingDirectory::new(self.directory.clone()));
        let directory: Arc<dyn Directory> = interleaving.clone();
        let identity: Arc<dyn IdentityProvider> = self.users.clone();
        let clock: Arc<dyn Clock> = self.clock.clone();

        let compliance_api = ComplianceApi::new(
            directory.clone(),
            identity.clone(),
            self.scheduler.clone(),
            self.load_tracker.clone(),
            clock.clone(),
        );
        let station_api = StationApi::new(
            directory,
            identity,
            self.load_tracker.clone(),
            clock,
            RecommendationConfig::default(),
        );
        (interleaving, compliance_api, station_api)
    }
}
