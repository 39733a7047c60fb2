// Partial, timestamped world knowledge held independently by every worker and
// by the commander. These are divergent replicas kept loosely in sync by
// gossip; merge is a per-key max-by-timestamp union, so it is commutative,
// associative and idempotent and the two-phase commit in the kernel can apply
// neighbour snapshots in any order.

use crate::agents::task::TaskStatus;
use crate::agents::worker::{WorkerMode, WorkerState};
use crate::sim::world::Pos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub pos: Pos,
    pub state: WorkerState,
    pub mode: WorkerMode,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub remaining_work: f64,
    pub status: TaskStatus,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoState {
    pub workers: BTreeMap<u32, WorkerInfo>,
    pub tasks: BTreeMap<u32, TaskInfo>,
}

impl InfoState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `other` into `self`, keeping the strictly newer fact per key.
    /// On equal timestamps the existing fact survives.
    pub fn merge(&mut self, other: &InfoState) {
        for (&wid, info) in &other.workers {
            match self.workers.get(&wid) {
                Some(have) if have.timestamp >= info.timestamp => {}
                _ => {
                    self.workers.insert(wid, *info);
                }
            }
        }
        for (&tid, info) in &other.tasks {
            match self.tasks.get(&tid) {
                Some(have) if have.timestamp >= info.timestamp => {}
                _ => {
                    self.tasks.insert(tid, *info);
                }
            }
        }
    }

    /// Record a first-hand observation of a worker. Same freshness rule as
    /// merge, so replaying an old observation is a no-op.
    pub fn observe_worker(&mut self, wid: u32, info: WorkerInfo) {
        match self.workers.get(&wid) {
            Some(have) if have.timestamp > info.timestamp => {}
            _ => {
                self.workers.insert(wid, info);
            }
        }
    }

    pub fn observe_task(&mut self, tid: u32, info: TaskInfo) {
        match self.tasks.get(&tid) {
            Some(have) if have.timestamp > info.timestamp => {}
            _ => {
                self.tasks.insert(tid, info);
            }
        }
    }

    /// Sum of information ages (AoI) over every held fact at `step`.
    pub fn age_sum(&self, step: u64) -> u64 {
        let workers = self
            .workers
            .values()
            .map(|i| step.saturating_sub(i.timestamp))
            .sum::<u64>();
        let tasks = self
            .tasks
            .values()
            .map(|i| step.saturating_sub(i.timestamp))
            .sum::<u64>();
        workers + tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tinfo(remaining: f64, ts: u64) -> TaskInfo {
        TaskInfo {
            remaining_work: remaining,
            status: if remaining <= 0.0 { TaskStatus::Done } else { TaskStatus::Pending },
            timestamp: ts,
        }
    }

    #[test]
    fn newer_fact_wins() {
        let mut a = InfoState::new();
        a.tasks.insert(1, tinfo(10.0, 3));
        let mut b = InfoState::new();
        b.tasks.insert(1, tinfo(4.0, 7));
        a.merge(&b);
        assert_eq!(a.tasks[&1].remaining_work, 4.0);
        assert_eq!(a.tasks[&1].timestamp, 7);
    }

    #[test]
    fn older_fact_never_overwrites() {
        let mut a = InfoState::new();
        a.tasks.insert(1, tinfo(4.0, 7));
        let mut b = InfoState::new();
        b.tasks.insert(1, tinfo(10.0, 3));
        a.merge(&b);
        assert_eq!(a.tasks[&1].timestamp, 7);
        // equal timestamp keeps the incumbent value too
        b.tasks.insert(1, tinfo(99.0, 7));
        a.merge(&b);
        assert_eq!(a.tasks[&1].remaining_work, 4.0);
    }

    #[test]
    fn age_sum_counts_every_fact() {
        let mut a = InfoState::new();
        a.tasks.insert(1, tinfo(1.0, 2));
        a.tasks.insert(2, tinfo(1.0, 5));
        assert_eq!(a.age_sum(5), 3);
        // timestamps ahead of the clock never underflow
        assert_eq!(a.age_sum(0), 0);
    }

    fn arb_info_state() -> impl Strategy<Value = InfoState> {
        proptest::collection::btree_map(0u32..8, (0.0f64..100.0, 0u64..20), 0..6).prop_map(|m| {
            let mut s = InfoState::new();
            for (tid, (rem, ts)) in m {
                s.tasks.insert(tid, tinfo(rem, ts));
            }
            s
        })
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(a in arb_info_state(), b in arb_info_state()) {
            let mut once = a.clone();
            once.merge(&b);
            let mut twice = once.clone();
            twice.merge(&b);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn merge_timestamps_never_decrease(a in arb_info_state(), b in arb_info_state()) {
            let mut merged = a.clone();
            merged.merge(&b);
            for (tid, info) in &a.tasks {
                prop_assert!(merged.tasks[tid].timestamp >= info.timestamp);
            }
        }

        #[test]
        fn merge_timestamps_commute(a in arb_info_state(), b in arb_info_state()) {
            let mut ab = a.clone();
            ab.merge(&b);
            let mut ba = b.clone();
            ba.merge(&a);
            // values can differ on exact timestamp ties, the clocks cannot
            for (tid, info) in &ab.tasks {
                prop_assert_eq!(ba.tasks[tid].timestamp, info.timestamp);
            }
        }
    }
}
