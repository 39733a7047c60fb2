// Centralized GA planning with decentralized execution. Every `interval`
// steps the selector reruns the genetic planner against current ground truth
// and adopts the median-by-makespan trial. Every step it re-reads each
// worker's *local* belief of route progress and points the worker at the
// first entry it cannot prove done, interleaving scheduled repair trips.

use super::TaskSelector;
use crate::agents::{TaskStatus, WorkerMode};
use crate::ga::{Individual, PlanningSnapshot, SimpleGa};
use crate::sim::world::World;
use anyhow::{Result, bail};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

#[derive(Debug, Clone)]
pub struct GaSelectorConfig {
    /// Steps between plan refreshes.
    pub interval: u64,
    pub pop_size: usize,
    pub generations: usize,
    pub elitism_rate: f64,
    /// Soft upper bound on route length.
    pub l_max: usize,
    pub seed: u64,
    /// Independent GA runs per refresh; the median result is adopted.
    pub trials: usize,
}

/// An adopted plan, translated from chromosome indices to entity ids.
#[derive(Debug, Clone)]
struct Plan {
    routes: BTreeMap<u32, Vec<u32>>,
    repairs: BTreeMap<u32, Vec<bool>>,
}

#[derive(Debug)]
pub struct GaSelector {
    cfg: GaSelectorConfig,
    plan: Option<Plan>,
    /// Completion count at which each worker last started a scheduled repair,
    /// so one flag fires at most once.
    last_repair_index: HashMap<u32, usize>,
}

impl GaSelector {
    pub fn new(mut cfg: GaSelectorConfig) -> Self {
        cfg.interval = cfg.interval.max(1);
        Self { cfg, plan: None, last_repair_index: HashMap::new() }
    }

    fn refresh_plan(&mut self, world: &World) -> Result<()> {
        if self.cfg.trials == 0 {
            bail!("ga: at least one trial is required");
        }
        let snapshot = PlanningSnapshot::capture(world, self.cfg.l_max);
        let evaluate = |ind: &Individual| snapshot.evaluate(ind);

        let num_workers = world.workers.len();
        let num_tasks = world.tasks.len();
        let base_seed = self.cfg.seed;

        // trials are independent; run them across cores
        let mut results: Vec<(u64, Individual)> = (0..self.cfg.trials as u64)
            .into_par_iter()
            .map(|trial| {
                let mut ga = SimpleGa::new(
                    num_workers,
                    num_tasks,
                    self.cfg.l_max,
                    self.cfg.pop_size,
                    self.cfg.generations,
                    self.cfg.elitism_rate,
                    &evaluate,
                    base_seed + trial,
                );
                (base_seed + trial, ga.run())
            })
            .collect();

        // median by estimated makespan, damping optimizer variance
        results.sort_by(|a, b| a.1.objectives[0].total_cmp(&b.1.objectives[0]));
        let (chosen_seed, chosen) = &results[results.len() / 2];

        info!(
            step = world.steps,
            trials = self.cfg.trials,
            chosen_seed,
            makespan = chosen.objectives[0],
            outside = chosen.objectives[1],
            "ga: plan refreshed"
        );

        let worker_ids: Vec<u32> = world.workers.keys().copied().collect();
        let task_ids: Vec<u32> = world.tasks.keys().copied().collect();

        let mut routes = BTreeMap::new();
        let mut repairs = BTreeMap::new();
        for (i, &wid) in worker_ids.iter().enumerate() {
            routes.insert(wid, chosen.routes[i].iter().map(|&t| task_ids[t]).collect());
            repairs.insert(wid, chosen.repairs[i].clone());
        }
        self.plan = Some(Plan { routes, repairs });
        Ok(())
    }

    /// How many leading route entries the worker's own information proves
    /// done. Stops at the first unknown or unfinished entry; this is a local
    /// progress pointer, not global truth.
    fn current_work(route: &[u32], world: &World, wid: u32) -> usize {
        let info = &world.workers[&wid].info;
        route
            .iter()
            .take_while(|tid| {
                info.tasks.get(tid).map(|t| t.status == TaskStatus::Done).unwrap_or(false)
            })
            .count()
    }
}

impl TaskSelector for GaSelector {
    fn assign_tasks(&mut self, world: &mut World) -> Result<()> {
        if world.steps.saturating_sub(1) % self.cfg.interval == 0 {
            self.refresh_plan(world)?;
        }
        let Some(plan) = self.plan.take() else {
            bail!("ga: no plan available at step {}", world.steps);
        };

        let ids: Vec<u32> = world.workers.keys().copied().collect();
        for wid in ids {
            if matches!(
                world.workers[&wid].mode,
                WorkerMode::GoRepair | WorkerMode::Repairing
            ) {
                continue;
            }

            let Some(route) = plan.routes.get(&wid) else {
                bail!("ga: plan has no route for worker {}", wid);
            };
            if route.is_empty() {
                let w = world.workers.get_mut(&wid).expect("worker registry is stable");
                w.target_task = None;
                w.mode = WorkerMode::Idle;
                continue;
            }

            let current_work = Self::current_work(route, world, wid);
            if current_work >= route.len() {
                let w = world.workers.get_mut(&wid).expect("worker registry is stable");
                w.target_task = None;
                w.mode = WorkerMode::Idle;
                continue;
            }

            let Some(flags) = plan.repairs.get(&wid).filter(|f| !f.is_empty()) else {
                bail!("ga: plan has empty repair flags for worker {}", wid);
            };
            let scheduled = flags.get(current_work).copied().unwrap_or(false);
            let already_fired = self.last_repair_index.get(&wid) == Some(&current_work);
            if scheduled && !already_fired {
                let w = world.workers.get_mut(&wid).expect("worker registry is stable");
                w.target_task = None;
                w.mode = WorkerMode::GoRepair;
                self.last_repair_index.insert(wid, current_work);
                continue;
            }

            let next = route[current_work];
            if !world.tasks.contains_key(&next) {
                bail!("ga: route of worker {} names unknown task {}", wid, next);
            }
            let w = world.workers.get_mut(&wid).expect("worker registry is stable");
            w.target_task = Some(next);
            w.mode = WorkerMode::Work;
        }

        self.plan = Some(plan);
        Ok(())
    }

    fn name(&self) -> &str {
        "ga"
    }
}
