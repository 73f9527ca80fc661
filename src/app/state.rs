// ==========================================
// 车辆合规管理系统 - 应用状态
// ==========================================
// 职责: 组装仓储、引擎、API 实例（组合根）
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ComplianceApi, StationApi};
use crate::config::{ComplianceConfigReader, ConfigManager};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{Clock, Directory, IdentityProvider, LoadTracker, NotificationDispatcher, ReminderScheduler};
use crate::repository::{NotificationRepository, SqliteDirectory, UserRepository};

/// 应用状态
///
/// 所有仓储共享同一 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,
    /// 时钟
    pub clock: Arc<dyn Clock>,
    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
    /// 车辆/站点/检查/评价目录
    pub directory: Arc<SqliteDirectory>,
    /// 用户仓储（身份解析）
    pub user_repo: Arc<UserRepository>,
    /// 站内通知仓储（默认通知投递）
    pub notification_repo: Arc<NotificationRepository>,
    /// 到期提醒调度器
    pub scheduler: Arc<ReminderScheduler>,
    /// 站点负载跟踪
    pub load_tracker: Arc<LoadTracker>,
    /// 合规API
    pub compliance_api: Arc<ComplianceApi>,
    /// 站点API
    pub station_api: Arc<StationApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 1. 打开数据库并幂等建表
    /// 2. 从 config_kv 读取调度/负载/推荐配置
    /// 3. 初始化仓储、引擎、API
    pub async fn new(db_path: String, clock: Arc<dyn Clock>) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));
        let scheduler_config = config_manager
            .get_scheduler_config()
            .await
            .map_err(|e| format!("读取调度配置失败: {}", e))?;
        let load_config = config_manager
            .get_load_config()
            .await
            .map_err(|e| format!("读取负载配置失败: {}", e))?;
        let recommendation_config = config_manager
            .get_recommendation_config()
            .await
            .map_err(|e| format!("读取推荐配置失败: {}", e))?;

        // ==========================================
        // 仓储
        // ==========================================
        let directory = Arc::new(SqliteDirectory::from_connection(conn.clone()));
        let user_repo = Arc::new(UserRepository::from_connection(conn.clone()));
        let notification_repo = Arc::new(NotificationRepository::from_connection(conn, clock.clone()));

        let dyn_directory: Arc<dyn Directory> = directory.clone();
        let identity: Arc<dyn IdentityProvider> = user_repo.clone();
        let dispatcher: Arc<dyn NotificationDispatcher> = notification_repo.clone();

        // ==========================================
        // 引擎
        // ==========================================
        let scheduler = Arc::new(
            ReminderScheduler::new(
                dyn_directory.clone(),
                identity.clone(),
                dispatcher,
                clock.clone(),
                scheduler_config,
            )
            .map_err(|e| format!("无法创建ReminderScheduler: {}", e))?,
        );
        let load_tracker = Arc::new(
            LoadTracker::new(dyn_directory.clone(), load_config)
                .map_err(|e| format!("无法创建LoadTracker: {}", e))?,
        );

        // ==========================================
        // API
        // ==========================================
        let compliance_api = Arc::new(ComplianceApi::new(
            dyn_directory.clone(),
            identity.clone(),
            scheduler.clone(),
            load_tracker.clone(),
            clock.clone(),
        ));
        let station_api = Arc::new(StationApi::new(
            dyn_directory,
            identity,
            load_tracker.clone(),
            clock.clone(),
            recommendation_config,
        ));

        tracing::info!("AppState初始化完成");
        Ok(Self {
            db_path,
            clock,
            config_manager,
            directory,
            user_repo,
            notification_repo,
            scheduler,
            load_tracker,
            compliance_api,
            station_api,
        })
    }

    /// 启动恢复：重建负载窗口、重排全部提醒、注册周期任务
    pub fn restore_timers(&self) -> Result<(), String> {
        let now = self.clock.now();
        self.load_tracker
            .rebuild_from_directory(now)
            .map_err(|e| format!("重建负载窗口失败: {}", e))?;
        self.scheduler
            .restore_from_directory()
            .map_err(|e| format!("恢复提醒任务失败: {}", e))?;
        self.scheduler
            .register_default_jobs()
            .map_err(|e| format!("注册周期任务失败: {}", e))?;
        Ok(())
    }
}

/// 获取默认数据库路径
///
/// # 优先级
/// 1. 环境变量 FUELLENS_DB_PATH
/// 2. 用户数据目录 (dirs::data_dir()/fuellens/fuellens.db)
/// 3. ./fuellens.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("FUELLENS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./fuellens.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("fuellens");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("fuellens.db");
        }
    }

    path.to_string_lossy().to_string()
}
