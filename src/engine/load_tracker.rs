// ==========================================
// 车辆合规管理系统 - 站点负载跟踪
// ==========================================
// 职责: 按站点维护最近检查时间戳，按滑动窗口计数派生负载等级并回写站点
// 规则: 窗口 [now - window, now] 含两端，按精确时间戳计数（不按整点分桶）
//       count >= busy → Busy；count >= normal → Normal；否则 Free
// 并发: 记录 + 重算 + 回写在同一把锁内完成；回写按重算时间戳后写者胜
// ==========================================

use crate::config::LoadConfig;
use crate::domain::{CheckFilter, LoadTier};
use crate::engine::collaborators::Directory;
use crate::engine::error::{EngineError, EngineResult};
use chrono::{Duration, NaiveDateTime};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct StationWindow {
    /// 升序
    timestamps: VecDeque<NaiveDateTime>,
    last_written_at: Option<NaiveDateTime>,
}

impl StationWindow {
    fn insert(&mut self, at: NaiveDateTime) {
        let pos = self.timestamps.partition_point(|t| *t <= at);
        self.timestamps.insert(pos, at);
    }

    fn count_in(&self, from: NaiveDateTime, to: NaiveDateTime) -> usize {
        let start = self.timestamps.partition_point(|t| *t < from);
        let end = self.timestamps.partition_point(|t| *t <= to);
        end.saturating_sub(start)
    }

    /// 丢弃早于最新时间戳一个窗口以上的记录
    fn prune(&mut self, window: Duration) {
        let Some(latest) = self.timestamps.back().copied() else {
            return;
        };
        let cutoff = latest - window;
        while self.timestamps.front().is_some_and(|t| *t < cutoff) {
            self.timestamps.pop_front();
        }
    }

    fn may_write(&self, at: NaiveDateTime) -> bool {
        self.last_written_at.map_or(true, |last| at >= last)
    }
}

// ==========================================
// LoadTracker
// ==========================================
pub struct LoadTracker {
    directory: Arc<dyn Directory>,
    config: LoadConfig,
    windows: Mutex<HashMap<String, StationWindow>>,
}

impl LoadTracker {
    /// # 错误
    /// - InvalidInput: 窗口或阈值不合法
    pub fn new(directory: Arc<dyn Directory>, config: LoadConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::InvalidInput)?;
        Ok(Self {
            directory,
            config,
            windows: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    fn window(&self) -> Duration {
        Duration::minutes(self.config.window_minutes)
    }

    fn lock_windows(&self) -> EngineResult<MutexGuard<'_, HashMap<String, StationWindow>>> {
        self.windows
            .lock()
            .map_err(|e| EngineError::LockPoisoned(format!("负载窗口锁: {}", e)))
    }

    /// 窗口内检查数 → 负载等级
    pub fn classify(&self, count: usize) -> LoadTier {
        if count >= self.config.busy_threshold {
            LoadTier::Busy
        } else if count >= self.config.normal_threshold {
            LoadTier::Normal
        } else {
            LoadTier::Free
        }
    }

    /// 记录一次检查，重算负载等级并回写站点
    ///
    /// # 错误
    /// - NotFound: 站点不存在
    pub fn record_check(&self, station_id: &str, at: NaiveDateTime) -> EngineResult<LoadTier> {
        let window = self.window();
        let mut windows = self.lock_windows()?;

        let station = self
            .directory
            .get_station(station_id)?
            .ok_or_else(|| EngineError::not_found("Station", station_id))?;

        let entry = windows.entry(station_id.to_string()).or_default();
        entry.insert(at);
        entry.prune(window);
        let count = entry.count_in(at - window, at);
        let tier = self.classify(count);

        if entry.may_write(at) {
            entry.last_written_at = Some(at);
            if station.load != tier {
                debug!(station_id, from = %station.load, to = %tier, count, "站点负载等级变化");
                self.directory.update_station_load(station_id, tier, at)?;
            }
        } else {
            debug!(station_id, at = %at, "乱序检查记录，不回写负载");
        }

        Ok(tier)
    }

    /// 计算站点在 now 时刻的负载等级（不回写）
    pub fn load_tier(&self, station_id: &str, now: NaiveDateTime) -> EngineResult<LoadTier> {
        let count = self.window_count(station_id, now)?;
        Ok(self.classify(count))
    }

    /// 窗口内检查数
    pub fn window_count(&self, station_id: &str, now: NaiveDateTime) -> EngineResult<usize> {
        let windows = self.lock_windows()?;
        Ok(windows
            .get(station_id)
            .map(|w| w.count_in(now - self.window(), now))
            .unwrap_or(0))
    }

    /// 按 now 重算并在等级衰减时回写站点
    ///
    /// # 错误
    /// - NotFound: 站点不存在
    pub fn refresh_station(&self, station_id: &str, now: NaiveDateTime) -> EngineResult<LoadTier> {
        let mut windows = self.lock_windows()?;
        let station = self
            .directory
            .get_station(station_id)?
            .ok_or_else(|| EngineError::not_found("Station", station_id))?;

        let entry = windows.entry(station_id.to_string()).or_default();
        let tier = self.classify(entry.count_in(now - self.window(), now));

        if station.load != tier && entry.may_write(now) {
            entry.last_written_at = Some(now);
            self.directory.update_station_load(station_id, tier, now)?;
            debug!(station_id, tier = %tier, "站点负载等级已刷新");
        }

        Ok(tier)
    }

    /// 启动恢复：从持久化检查记录重建各站点窗口
    ///
    /// # 返回
    /// - 载入的检查记录数
    pub fn rebuild_from_directory(&self, now: NaiveDateTime) -> EngineResult<usize> {
        let since = now - self.window();
        let stations = self.directory.list_active_stations()?;

        let mut rebuilt: HashMap<String, StationWindow> = HashMap::new();
        let mut loaded = 0;
        for station in &stations {
            let checks = self
                .directory
                .list_checks(&CheckFilter::for_station(&station.station_id).since(since))?;
            let mut window = StationWindow::default();
            for check in checks.iter().filter(|c| c.checked_at <= now) {
                window.insert(check.checked_at);
            }
            loaded += window.timestamps.len();
            rebuilt.insert(station.station_id.clone(), window);
        }

        *self.lock_windows()? = rebuilt;
        info!(stations = stations.len(), checks = loaded, "站点负载窗口已重建");
        Ok(loaded)
    }
}
