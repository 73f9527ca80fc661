// ==========================================
// 车辆合规管理系统 - 定时任务队列
// ==========================================
// 结构: 按到期时间排序的小顶堆 + (任务键 → 当前有效条目) 索引
// 取消: 只删除索引，堆中残留条目在出队时按 seq 失配丢弃（惰性删除）
// 红线: 任一任务键同一时刻最多一个有效任务
// ==========================================

use chrono::NaiveDateTime;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// 任务键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobKey {
    /// 到期提醒：(车辆, 到期前天数)
    Reminder { vehicle_id: String, offset_days: i64 },
    /// 周期任务：稳定名称
    Recurring(String),
}

impl JobKey {
    pub fn reminder(vehicle_id: &str, offset_days: i64) -> Self {
        JobKey::Reminder {
            vehicle_id: vehicle_id.to_string(),
            offset_days,
        }
    }
}

/// 出队的到期任务
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueJob {
    pub key: JobKey,
    pub due_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeapEntry {
    due_at: NaiveDateTime,
    seq: u64,
    key: JobKey,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_at
            .cmp(&other.due_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveEntry {
    due_at: NaiveDateTime,
    seq: u64,
}

// ==========================================
// JobQueue
// ==========================================
#[derive(Debug, Default)]
pub struct JobQueue {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    live: HashMap<JobKey, LiveEntry>,
    by_vehicle: HashMap<String, BTreeSet<i64>>,
    next_seq: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队（同键已存在时替换）
    ///
    /// # 返回
    /// - Some(prev_due): 被替换任务的原到期时间
    /// - None: 新任务
    pub fn schedule(&mut self, key: JobKey, due_at: NaiveDateTime) -> Option<NaiveDateTime> {
        self.next_seq += 1;
        let seq = self.next_seq;

        let prev = self.live.insert(key.clone(), LiveEntry { due_at, seq });
        if let JobKey::Reminder { vehicle_id, offset_days } = &key {
            self.by_vehicle
                .entry(vehicle_id.clone())
                .or_default()
                .insert(*offset_days);
        }
        self.heap.push(Reverse(HeapEntry { due_at, seq, key }));
        self.maybe_compact();

        prev.map(|p| p.due_at)
    }

    /// 取消任务，返回是否存在
    pub fn cancel(&mut self, key: &JobKey) -> bool {
        let existed = self.live.remove(key).is_some();
        if existed {
            self.unindex(key);
        }
        existed
    }

    /// 取消车辆的全部提醒，返回取消数量
    pub fn cancel_vehicle(&mut self, vehicle_id: &str) -> usize {
        let offsets = match self.by_vehicle.remove(vehicle_id) {
            Some(offsets) => offsets,
            None => return 0,
        };

        offsets
            .into_iter()
            .filter(|&offset_days| self.live.remove(&JobKey::reminder(vehicle_id, offset_days)).is_some())
            .count()
    }

    /// 弹出所有 due_at <= now 的有效任务（按到期时间、入队顺序）
    pub fn pop_due(&mut self, now: NaiveDateTime) -> Vec<DueJob> {
        let mut due = Vec::new();
        while let Some(Reverse(top)) = self.heap.peek() {
            if top.due_at > now {
                break;
            }
            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };
            if self.is_current(&entry) {
                self.live.remove(&entry.key);
                self.unindex(&entry.key);
                due.push(DueJob {
                    key: entry.key,
                    due_at: entry.due_at,
                });
            }
        }
        due
    }

    /// 最早的有效到期时间（顺带清理堆顶失效条目）
    pub fn next_due(&mut self) -> Option<NaiveDateTime> {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.is_current(top) {
                return Some(top.due_at);
            }
            self.heap.pop();
        }
        None
    }

    /// 任务的到期时间（不存在返回 None）
    pub fn due_of(&self, key: &JobKey) -> Option<NaiveDateTime> {
        self.live.get(key).map(|e| e.due_at)
    }

    /// 车辆待执行提醒 (offset_days, due_at)，按偏移降序
    pub fn pending_for_vehicle(&self, vehicle_id: &str) -> Vec<(i64, NaiveDateTime)> {
        self.by_vehicle
            .get(vehicle_id)
            .map(|offsets| {
                offsets
                    .iter()
                    .rev()
                    .filter_map(|&offset| {
                        self.due_of(&JobKey::reminder(vehicle_id, offset))
                            .map(|due| (offset, due))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_pending_for_vehicle(&self, vehicle_id: &str) -> bool {
        self.by_vehicle
            .get(vehicle_id)
            .map(|offsets| !offsets.is_empty())
            .unwrap_or(false)
    }

    /// 有效任务数
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn is_current(&self, entry: &HeapEntry) -> bool {
        self.live
            .get(&entry.key)
            .map(|live| live.seq == entry.seq)
            .unwrap_or(false)
    }

    fn unindex(&mut self, key: &JobKey) {
        if let JobKey::Reminder { vehicle_id, offset_days } = key {
            if let Some(offsets) = self.by_vehicle.get_mut(vehicle_id) {
                offsets.remove(offset_days);
                if offsets.is_empty() {
                    self.by_vehicle.remove(vehicle_id);
                }
            }
        }
    }

    /// 失效条目过多时重建堆
    fn maybe_compact(&mut self) {
        if self.heap.len() <= 64 || self.heap.len() <= self.live.len() * 2 {
            return;
        }
        self.heap = self
            .live
            .iter()
            .map(|(key, e)| {
                Reverse(HeapEntry {
                    due_at: e.due_at,
                    seq: e.seq,
                    key: key.clone(),
                })
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_replace_keeps_single_live_job() {
        let mut q = JobQueue::new();
        assert_eq!(q.schedule(JobKey::reminder("V1", 30), at(1, 9)), None);
        assert_eq!(q.schedule(JobKey::reminder("V1", 30), at(3, 9)), Some(at(1, 9)));
        assert_eq!(q.len(), 1);

        // 旧条目不会被弹出
        assert!(q.pop_due(at(2, 9)).is_empty());
        let due = q.pop_due(at(3, 9));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].due_at, at(3, 9));
        assert!(q.is_empty());
    }

    #[test]
    fn test_pop_due_in_time_order() {
        let mut q = JobQueue::new();
        q.schedule(JobKey::reminder("V1", 1), at(5, 9));
        q.schedule(JobKey::reminder("V2", 7), at(2, 9));
        q.schedule(JobKey::Recurring("daily".to_string()), at(2, 9));

        let due = q.pop_due(at(10, 0));
        let keys: Vec<JobKey> = due.into_iter().map(|d| d.key).collect();
        assert_eq!(
            keys,
            vec![
                JobKey::reminder("V2", 7),
                JobKey::Recurring("daily".to_string()),
                JobKey::reminder("V1", 1),
            ]
        );
    }

    #[test]
    fn test_cancel_vehicle_removes_all_offsets() {
        let mut q = JobQueue::new();
        for (i, offset) in [30, 15, 7, 1].into_iter().enumerate() {
            q.schedule(JobKey::reminder("V1", offset), at(1 + i as u32, 9));
        }
        q.schedule(JobKey::reminder("V2", 30), at(1, 9));

        assert_eq!(q.pending_for_vehicle("V1").len(), 4);
        assert_eq!(q.cancel_vehicle("V1"), 4);
        assert!(!q.has_pending_for_vehicle("V1"));
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_due(), Some(at(1, 9)));
        assert_eq!(q.cancel_vehicle("V1"), 0);
    }

    #[test]
    fn test_compaction_preserves_live_jobs() {
        let mut q = JobQueue::new();
        let base = at(1, 0);
        for i in 0..200 {
            q.schedule(JobKey::reminder("V1", 30), base + Duration::minutes(i));
        }
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_due(), Some(base + Duration::minutes(199)));
    }
}
