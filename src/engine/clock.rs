// ==========================================
// 车辆合规管理系统 - 时钟
// ==========================================
// 职责: 统一“当前时间”来源，调度器、巡检、负载统计均从此读取
// 说明: 全部使用本地时间 (NaiveDateTime)，提醒固定在本地 09:00 触发
// ==========================================

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use std::sync::Mutex;

/// 时钟 Trait
pub trait Clock: Send + Sync {
    /// 当前本地时间
    fn now(&self) -> NaiveDateTime;

    /// 当前本地日期
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// 手动时钟（测试用，可设置/推进）
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// 设置为指定时间
    pub fn set(&self, at: NaiveDateTime) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard = at;
    }

    /// 向前推进
    pub fn advance(&self, by: Duration) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
