use crate::agents::task::Task;
use crate::agents::worker::Worker;
use crate::info::{InfoState, TaskInfo, WorkerInfo};
use crate::sim::world::Pos;

/// Fixed command post. Seeded with full ground truth at setup; afterwards it
/// learns only what in-range workers gossip to it, like everyone else.
#[derive(Debug, Clone)]
pub struct Commander {
    pub pos: Pos,
    pub info: InfoState,
}

impl Commander {
    pub fn new(pos: Pos) -> Self {
        Self { pos, info: InfoState::new() }
    }

    /// One-time snapshot of the freshly loaded scenario, timestamp 0.
    pub fn seed_full_info<'a>(
        &mut self,
        workers: impl Iterator<Item = &'a Worker>,
        tasks: impl Iterator<Item = &'a Task>,
    ) {
        for w in workers {
            self.info.observe_worker(
                w.id,
                WorkerInfo { pos: w.pos, state: w.state, mode: w.mode, timestamp: 0 },
            );
        }
        for t in tasks {
            self.info.observe_task(
                t.id,
                TaskInfo {
                    remaining_work: t.remaining_work,
                    status: t.status,
                    timestamp: 0,
                },
            );
        }
    }
}
