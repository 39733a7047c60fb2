use crate::sim::world::Pos;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

/// A fixed amount of work at a fixed position. Owned by the kernel; only the
/// worker currently working it drains `remaining_work`.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: u32,
    pub pos: Pos,
    pub total_work: f64,
    pub remaining_work: f64,
    pub status: TaskStatus,
    /// First step at which remaining_work reached 0. Set once, never changed.
    pub finished_step: Option<u64>,
}

impl Task {
    pub fn new(id: u32, pos: Pos, total_work: f64, remaining_work: f64) -> Self {
        Self {
            id,
            pos,
            total_work,
            remaining_work,
            status: if remaining_work <= 0.0 { TaskStatus::Done } else { TaskStatus::Pending },
            finished_step: None,
        }
    }

    /// Drain up to `work` units. Crossing zero flips the task to done and
    /// records the finishing step exactly once.
    pub fn apply_work(&mut self, work: f64, step: u64) {
        if self.status == TaskStatus::Done {
            return;
        }
        self.status = TaskStatus::InProgress;
        self.remaining_work -= work;
        if self.remaining_work <= 0.0 {
            self.remaining_work = 0.0;
            self.mark_done(step);
        }
    }

    /// Step-boundary bookkeeping: catch a task whose work hit zero without
    /// going through apply_work (e.g. loaded as already complete).
    pub fn refresh_status(&mut self, step: u64) {
        if self.remaining_work <= 0.0 {
            self.remaining_work = 0.0;
            self.mark_done(step);
        }
    }

    fn mark_done(&mut self, step: u64) {
        self.status = TaskStatus::Done;
        if self.finished_step.is_none() {
            self.finished_step = Some(step);
        }
    }
}
