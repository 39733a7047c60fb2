pub mod logger;

use crate::sim::world::World;
use serde::{Deserialize, Serialize};

/// One worker, one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRow {
    pub step: u64,
    pub worker_id: u32,
    pub x: f64,
    pub y: f64,
    pub h: f64,
    pub cum_distance: f64,
    pub info_age_sum: u64,
    pub state: String,
    pub mode: String,
    pub target_task_id: Option<u32>,
}

/// One task, one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRow {
    pub step: u64,
    pub task_id: u32,
    pub remaining_work: f64,
    pub status: String,
    pub finished_step: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommanderRow {
    pub step: u64,
    pub info_age_sum: u64,
}

/// Read-only per-step snapshot of the world, the logging-facing surface of
/// the kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub workers: Vec<WorkerRow>,
    pub tasks: Vec<TaskRow>,
    pub commander: CommanderRow,
}

impl StepSnapshot {
    pub fn capture(world: &World) -> Self {
        let step = world.steps;
        let workers = world
            .workers
            .values()
            .map(|w| WorkerRow {
                step,
                worker_id: w.id,
                x: w.pos.0,
                y: w.pos.1,
                h: w.h,
                cum_distance: w.total_move_distance,
                info_age_sum: w.info.age_sum(step),
                state: w.state.to_string(),
                mode: w.mode.to_string(),
                target_task_id: w.target_task,
            })
            .collect();
        let tasks = world
            .tasks
            .values()
            .map(|t| TaskRow {
                step,
                task_id: t.id,
                remaining_work: t.remaining_work,
                status: t.status.to_string(),
                finished_step: t.finished_step,
            })
            .collect();
        let commander =
            CommanderRow { step, info_age_sum: world.commander.info.age_sum(step) };
        Self { workers, tasks, commander }
    }
}

/// Final summary of a run, written as JSON next to the step CSVs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub scenario: String,
    pub selector: String,
    pub seed: u64,
    pub steps: u64,
    pub all_done: bool,
    pub makespan: f64,
    pub total_move_distance: f64,
    pub failures_outstanding: usize,
}

impl RunReport {
    pub fn capture(world: &World, selector: &str, seed: u64) -> Self {
        Self {
            scenario: world.scenario_name.clone(),
            selector: selector.to_string(),
            seed,
            steps: world.steps,
            all_done: world.all_tasks_done(),
            makespan: world.get_makespan(world.max_steps as f64 * world.time_step),
            total_move_distance: world
                .workers
                .values()
                .map(|w| w.total_move_distance)
                .sum(),
            failures_outstanding: world
                .workers
                .values()
                .filter(|w| w.state == crate::agents::WorkerState::Failed)
                .count(),
        }
    }
}
