use crate::failure::FailureModel;
use crate::info::{InfoState, TaskInfo, WorkerInfo};
use crate::sim::world::{Pos, dist};
use crate::agents::task::{Task, TaskStatus};
use anyhow::{Result, bail};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const ARRIVAL_EPS: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Healthy,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    Work,
    Idle,
    GoRepair,
    Repairing,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Healthy => write!(f, "healthy"),
            WorkerState::Failed => write!(f, "failed"),
        }
    }
}

impl std::fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerMode::Work => write!(f, "work"),
            WorkerMode::Idle => write!(f, "idle"),
            WorkerMode::GoRepair => write!(f, "go_repair"),
            WorkerMode::Repairing => write!(f, "repairing"),
        }
    }
}

/// Immutable per-step context handed to every worker by the kernel.
pub struct StepCtx<'a> {
    pub dt: f64,
    pub step: u64,
    pub repair_depot: Pos,
    pub repair_duration: f64,
    pub failure_model: &'a dyn FailureModel,
}

/// A mobile worker: moves, works, wears out, fails, gets repaired. Position
/// is mutated only by the movement routine here; `target_task` is written by
/// the allocation policy and cleared here on completion or observed loss.
#[derive(Debug, Clone)]
pub struct Worker {
    pub id: u32,
    pub pos: Pos,
    pub speed: f64,
    pub throughput: f64,
    /// Rate multipliers applied while failed, in [0, 1].
    pub speed_eta: f64,
    pub throughput_eta: f64,
    /// Accumulated fatigue. Non-decreasing except for the reset on repair.
    pub h: f64,
    /// Fatigue accrued since the last failure check.
    pub delta_h: f64,
    pub fatigue_move: f64,
    pub fatigue_work: f64,
    pub state: WorkerState,
    pub mode: WorkerMode,
    pub repair_time_left: f64,
    pub target_task: Option<u32>,
    pub total_move_distance: f64,
    /// Committed local knowledge, read by policies and gossiped to peers.
    pub info: InfoState,
    /// Candidate snapshot for the current step; committed by the kernel once
    /// every worker has computed theirs.
    pub pending_info: Option<InfoState>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        pos: Pos,
        speed: f64,
        throughput: f64,
        speed_eta: f64,
        throughput_eta: f64,
        initial_h: f64,
        fatigue_move: f64,
        fatigue_work: f64,
    ) -> Self {
        Self {
            id,
            pos,
            speed,
            throughput,
            speed_eta,
            throughput_eta,
            h: initial_h,
            // no check has happened yet, so all initial fatigue is unchecked
            delta_h: initial_h,
            fatigue_move,
            fatigue_work,
            state: WorkerState::Healthy,
            mode: WorkerMode::Idle,
            repair_time_left: 0.0,
            target_task: None,
            total_move_distance: 0.0,
            info: InfoState::new(),
            pending_info: None,
        }
    }

    pub fn effective_speed(&self) -> f64 {
        match self.state {
            WorkerState::Healthy => self.speed,
            WorkerState::Failed => self.speed * self.speed_eta,
        }
    }

    pub fn effective_throughput(&self) -> f64 {
        match self.state {
            WorkerState::Healthy => self.throughput,
            WorkerState::Failed => self.throughput * self.throughput_eta,
        }
    }

    /// One physical step: failure check, then move/work/repair according to
    /// the current mode. Task mutation happens only through `tasks`.
    pub fn execute_step(
        &mut self,
        ctx: &StepCtx,
        tasks: &mut BTreeMap<u32, Task>,
        rng: &mut StdRng,
    ) -> Result<()> {
        if self.state == WorkerState::Healthy {
            self.check_failure(ctx.failure_model, rng);
        }

        match self.mode {
            WorkerMode::Idle => {}
            WorkerMode::Repairing => self.step_repairing(ctx.dt),
            WorkerMode::GoRepair => self.step_go_repair(ctx),
            WorkerMode::Work => self.step_work(ctx, tasks)?,
        }

        self.observe_self(ctx.step);
        Ok(())
    }

    fn check_failure(&mut self, model: &dyn FailureModel, rng: &mut StdRng) {
        let h_before = (self.h - self.delta_h).max(0.0);
        let p = model.failure_prob_step(h_before, self.delta_h);
        self.delta_h = 0.0;
        if p <= 0.0 {
            return;
        }
        if rng.gen_range(0.0..1.0) < p {
            self.state = WorkerState::Failed;
        }
    }

    fn step_repairing(&mut self, dt: f64) {
        self.repair_time_left -= dt;
        if self.repair_time_left <= 0.0 {
            self.finish_repair();
        }
    }

    fn step_go_repair(&mut self, ctx: &StepCtx) {
        if let Some(leftover) = self.advance_toward(ctx.repair_depot, ctx.dt) {
            self.mode = WorkerMode::Repairing;
            self.repair_time_left = ctx.repair_duration - leftover;
            if self.repair_time_left <= 0.0 {
                self.finish_repair();
            }
        }
    }

    fn finish_repair(&mut self) {
        self.state = WorkerState::Healthy;
        self.h = 0.0;
        self.delta_h = 0.0;
        self.repair_time_left = 0.0;
        // idle re-triggers allocation on the next step
        self.mode = WorkerMode::Idle;
        self.target_task = None;
    }

    fn step_work(&mut self, ctx: &StepCtx, tasks: &mut BTreeMap<u32, Task>) -> Result<()> {
        let Some(tid) = self.target_task else {
            bail!("worker {} is in work mode with no target task", self.id);
        };
        let Some(task) = tasks.get_mut(&tid) else {
            bail!("worker {} targets unknown task {}", self.id, tid);
        };

        if task.status == TaskStatus::Done {
            // lost the race; observe the completion and stand down
            self.record_task(task, ctx.step);
            self.target_task = None;
            self.mode = WorkerMode::Idle;
            return Ok(());
        }

        if let Some(leftover) = self.advance_toward(task.pos, ctx.dt) {
            if leftover > ARRIVAL_EPS {
                let rate = self.effective_throughput();
                if rate > 0.0 {
                    let work_time = leftover.min(task.remaining_work / rate);
                    task.apply_work(rate * work_time, ctx.step);
                    self.accrue(self.fatigue_work * work_time);
                }
            }
        }

        self.record_task(task, ctx.step);
        if task.status == TaskStatus::Done {
            self.target_task = None;
            self.mode = WorkerMode::Idle;
        }
        Ok(())
    }

    /// Move toward `target` for up to `dt`. Returns the unspent time budget if
    /// the target was reached this step, `None` if not. A worker that cannot
    /// move (zero effective speed, distance unmet) simply does not arrive.
    fn advance_toward(&mut self, target: Pos, dt: f64) -> Option<f64> {
        let d = dist(self.pos, target);
        if d < ARRIVAL_EPS {
            return Some(dt);
        }
        let speed = self.effective_speed();
        if speed <= 0.0 {
            return None;
        }
        let max_d = speed * dt;
        if d <= max_d {
            self.pos = target;
            self.total_move_distance += d;
            let move_time = d / speed;
            self.accrue(self.fatigue_move * move_time);
            Some(dt - move_time)
        } else {
            let ratio = max_d / d;
            self.pos = (
                self.pos.0 + (target.0 - self.pos.0) * ratio,
                self.pos.1 + (target.1 - self.pos.1) * ratio,
            );
            self.total_move_distance += max_d;
            self.accrue(self.fatigue_move * dt);
            None
        }
    }

    fn accrue(&mut self, fatigue: f64) {
        self.h += fatigue;
        self.delta_h += fatigue;
    }

    fn record_task(&mut self, task: &Task, step: u64) {
        self.info.observe_task(
            task.id,
            TaskInfo {
                remaining_work: task.remaining_work,
                status: task.status,
                timestamp: step,
            },
        );
    }

    fn observe_self(&mut self, step: u64) {
        self.info.observe_worker(
            self.id,
            WorkerInfo {
                pos: self.pos,
                state: self.state,
                mode: self.mode,
                timestamp: step,
            },
        );
    }
}
