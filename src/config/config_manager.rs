// ==========================================
// 车辆合规管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::compliance_config::{LoadConfig, RecommendationConfig, SchedulerConfig};
use crate::config::compliance_config_trait::ComplianceConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use chrono::Weekday;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const REMINDER_OFFSETS_DAYS: &str = "reminder_offsets_days";
    pub const REMINDER_HOUR: &str = "reminder_hour";
    pub const DAILY_SWEEP_HOUR: &str = "daily_sweep_hour";
    pub const WEEKLY_DIGEST_WEEKDAY: &str = "weekly_digest_weekday";
    pub const WEEKLY_DIGEST_HOUR: &str = "weekly_digest_hour";
    pub const SCHEDULER_POLL_INTERVAL_SECS: &str = "scheduler_poll_interval_secs";
    pub const DISPATCH_MAX_RETRIES: &str = "dispatch_max_retries";
    pub const LOAD_WINDOW_MINUTES: &str = "load_window_minutes";
    pub const LOAD_BUSY_THRESHOLD: &str = "load_busy_threshold";
    pub const LOAD_NORMAL_THRESHOLD: &str = "load_normal_threshold";
    pub const RECOMMEND_DEFAULT_RADIUS_KM: &str = "recommend_default_radius_km";
    pub const RECOMMEND_DEFAULT_TOP_K: &str = "recommend_default_top_k";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取并解析配置值；缺失或解析失败时返回默认值
    fn get_parsed_or_default<T: FromStr>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, Box<dyn Error + Send + Sync>> {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 解析提醒偏移（JSON 数组，例如 [30,15,7,1]）
    fn get_reminder_offsets(&self, default: Vec<i64>) -> Result<Vec<i64>, Box<dyn Error + Send + Sync>> {
        let raw = match self.get_config_value(config_keys::REMINDER_OFFSETS_DAYS)? {
            Some(v) => v,
            None => return Ok(default),
        };

        match serde_json::from_str::<Vec<i64>>(&raw) {
            Ok(offsets) => Ok(offsets),
            Err(e) => {
                tracing::warn!(
                    config_key = config_keys::REMINDER_OFFSETS_DAYS,
                    raw_value = %raw,
                    error = %e,
                    "提醒偏移配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    fn get_weekday(&self, key: &str, default: Weekday) -> Result<Weekday, Box<dyn Error + Send + Sync>> {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<Weekday>() {
                Ok(day) => Ok(day),
                Err(_) => {
                    tracing::warn!(config_key = key, raw_value = %raw, "星期配置格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

// ==========================================
// ComplianceConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ComplianceConfigReader for ConfigManager {
    async fn get_scheduler_config(&self) -> Result<SchedulerConfig, Box<dyn Error + Send + Sync>> {
        let d = SchedulerConfig::default();
        Ok(SchedulerConfig {
            reminder_offsets: self.get_reminder_offsets(d.reminder_offsets)?,
            reminder_hour: self.get_parsed_or_default(config_keys::REMINDER_HOUR, d.reminder_hour)?,
            daily_sweep_hour: self
                .get_parsed_or_default(config_keys::DAILY_SWEEP_HOUR, d.daily_sweep_hour)?,
            weekly_digest_weekday: self
                .get_weekday(config_keys::WEEKLY_DIGEST_WEEKDAY, d.weekly_digest_weekday)?,
            weekly_digest_hour: self
                .get_parsed_or_default(config_keys::WEEKLY_DIGEST_HOUR, d.weekly_digest_hour)?,
            poll_interval_secs: self.get_parsed_or_default(
                config_keys::SCHEDULER_POLL_INTERVAL_SECS,
                d.poll_interval_secs,
            )?,
            dispatch_max_retries: self
                .get_parsed_or_default(config_keys::DISPATCH_MAX_RETRIES, d.dispatch_max_retries)?,
        })
    }

    async fn get_load_config(&self) -> Result<LoadConfig, Box<dyn Error + Send + Sync>> {
        let d = LoadConfig::default();
        Ok(LoadConfig {
            window_minutes: self
                .get_parsed_or_default(config_keys::LOAD_WINDOW_MINUTES, d.window_minutes)?,
            busy_threshold: self
                .get_parsed_or_default(config_keys::LOAD_BUSY_THRESHOLD, d.busy_threshold)?,
            normal_threshold: self
                .get_parsed_or_default(config_keys::LOAD_NORMAL_THRESHOLD, d.normal_threshold)?,
        })
    }

    async fn get_recommendation_config(
        &self,
    ) -> Result<RecommendationConfig, Box<dyn Error + Send + Sync>> {
        let d = RecommendationConfig::default();
        Ok(RecommendationConfig {
            default_radius_km: self
                .get_parsed_or_default(config_keys::RECOMMEND_DEFAULT_RADIUS_KM, d.default_radius_km)?,
            default_top_k: self
                .get_parsed_or_default(config_keys::RECOMMEND_DEFAULT_TOP_K, d.default_top_k)?,
        })
    }
}
