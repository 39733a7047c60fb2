// Simulation kernel: owns the space and the entity registries and advances
// the fixed per-step protocol:
//   1. every worker computes a candidate info snapshot from committed state
//   2. all snapshots commit at once
//   3. task begin-step bookkeeping
//   4. the allocation policy assigns targets/modes
//   5. every worker executes its physical step
//   6. task end-step bookkeeping
//   7. the caller's logging hook (driven by Simulation)

use crate::agents::{Commander, StepCtx, Task, Worker};
use crate::failure::{self, FailureModel};
use crate::selectors::TaskSelector;
use crate::sim::config::Scenario;
use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

pub type Pos = (f64, f64);

pub fn dist(a: Pos, b: Pos) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

pub struct World {
    pub scenario_name: String,
    pub width: f64,
    pub height: f64,
    pub communication_range: f64,
    pub time_step: f64,
    pub max_steps: u64,
    /// Discrete clock; incremented at the start of each step, so the first
    /// step observes `steps == 1`.
    pub steps: u64,
    pub repair_depot: Pos,
    pub repair_duration: f64,
    pub commander: Commander,
    pub workers: BTreeMap<u32, Worker>,
    pub tasks: BTreeMap<u32, Task>,
    pub failure_model: Box<dyn FailureModel>,
    rng: StdRng,
}

impl World {
    pub fn from_scenario(cfg: &Scenario, seed: u64) -> Result<Self> {
        cfg.validate()?;
        let failure_model = failure::create(&cfg.failure_model.name, &cfg.failure_model.params)?;

        let mut workers = BTreeMap::new();
        for spec in &cfg.workers {
            workers.insert(
                spec.id,
                Worker::new(
                    spec.id,
                    spec.position,
                    spec.speed,
                    spec.throughput,
                    spec.speed_eta,
                    spec.throughput_eta,
                    spec.initial_h,
                    spec.fatigue_move,
                    spec.fatigue_work,
                ),
            );
        }

        let mut tasks = BTreeMap::new();
        for spec in &cfg.tasks {
            tasks.insert(
                spec.id,
                Task::new(spec.id, spec.position, spec.total_work, spec.remaining_work),
            );
        }

        let mut commander = Commander::new(cfg.command_center.position);
        commander.seed_full_info(workers.values(), tasks.values());

        Ok(Self {
            scenario_name: cfg.scenario_name.clone(),
            width: cfg.space.width,
            height: cfg.space.height,
            communication_range: cfg.communication.range,
            time_step: cfg.sim.time_step,
            max_steps: cfg.sim.max_steps,
            steps: 0,
            repair_depot: cfg.repair_depot.position,
            repair_duration: cfg.repair_depot.repair_duration,
            commander,
            workers,
            tasks,
            failure_model,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn distance(&self, a: Pos, b: Pos) -> f64 {
        dist(a, b)
    }

    pub fn can_communicate(&self, a: Pos, b: Pos) -> bool {
        self.distance(a, b) <= self.communication_range
    }

    pub fn all_tasks_done(&self) -> bool {
        self.tasks.values().all(|t| t.finished_step.is_some())
    }

    /// Simulated completion time of the last task, or `fallback` if nothing
    /// has finished yet.
    pub fn get_makespan(&self, fallback: f64) -> f64 {
        self.tasks
            .values()
            .filter_map(|t| t.finished_step)
            .max()
            .map(|s| s as f64 * self.time_step)
            .unwrap_or(fallback)
    }

    /// Advance exactly one tick.
    pub fn step(&mut self, selector: &mut dyn TaskSelector) -> Result<()> {
        self.steps += 1;
        let step = self.steps;

        self.exchange_info();

        for t in self.tasks.values_mut() {
            t.refresh_status(step);
        }

        selector.assign_tasks(self)?;

        self.execute_workers()?;

        for t in self.tasks.values_mut() {
            t.refresh_status(step);
        }
        Ok(())
    }

    /// Two-phase gossip. Every candidate merges only *committed* snapshots,
    /// so within one step nobody observes a neighbour's half-built update and
    /// the merge order cannot bias the outcome.
    fn exchange_info(&mut self) {
        let ids: Vec<u32> = self.workers.keys().copied().collect();

        let mut candidates = Vec::with_capacity(ids.len());
        for &wid in &ids {
            let w = &self.workers[&wid];
            let mut next = w.info.clone();
            if self.can_communicate(w.pos, self.commander.pos) {
                next.merge(&self.commander.info);
            }
            for (&oid, other) in &self.workers {
                if oid != wid && self.can_communicate(w.pos, other.pos) {
                    next.merge(&other.info);
                }
            }
            candidates.push(next);
        }

        let mut commander_next = self.commander.info.clone();
        for w in self.workers.values() {
            if self.can_communicate(self.commander.pos, w.pos) {
                commander_next.merge(&w.info);
            }
        }

        for (wid, next) in ids.iter().zip(candidates) {
            self.workers.get_mut(wid).expect("worker registry is stable").pending_info =
                Some(next);
        }

        // commit barrier
        for w in self.workers.values_mut() {
            if let Some(next) = w.pending_info.take() {
                w.info = next;
            }
        }
        self.commander.info = commander_next;
    }

    fn execute_workers(&mut self) -> Result<()> {
        let World {
            workers,
            tasks,
            failure_model,
            rng,
            steps,
            time_step,
            repair_depot,
            repair_duration,
            ..
        } = self;
        let ctx = StepCtx {
            dt: *time_step,
            step: *steps,
            repair_depot: *repair_depot,
            repair_duration: *repair_duration,
            failure_model: failure_model.as_ref(),
        };
        for w in workers.values_mut() {
            w.execute_step(&ctx, tasks, rng)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::TaskInfo;
    use crate::agents::TaskStatus;
    use serde_json::json;

    #[derive(Debug)]
    struct NoopSelector;

    impl TaskSelector for NoopSelector {
        fn assign_tasks(&mut self, _world: &mut World) -> Result<()> {
            Ok(())
        }
        fn name(&self) -> &str {
            "noop"
        }
    }

    fn chain_scenario() -> Scenario {
        // three workers in a line, only adjacent pairs within range,
        // commander far out of everyone's range
        serde_json::from_value(json!({
            "scenario_name": "chain",
            "space": { "width": 1000.0, "height": 1000.0 },
            "sim": { "max_steps": 10, "time_step": 1.0 },
            "command_center": { "position": [999.0, 999.0] },
            "repair_depot": { "position": [0.0, 0.0], "repair_duration": 5.0 },
            "communication": { "range": 12.0 },
            "failure_model": { "name": "exponential", "params": { "lambda": 0.0 } },
            "task_selector": { "name": "nearest" },
            "workers": (0..3u32).map(|i| json!({
                "id": i, "position": [10.0 * i as f64, 0.0], "speed": 0.0, "throughput": 1.0,
                "speed_eta": 1.0, "throughput_eta": 1.0,
                "fatigue_move": 0.0, "fatigue_work": 0.0
            })).collect::<Vec<_>>(),
            "tasks": [{
                "id": 9, "position": [500.0, 0.0], "total_work": 3.0, "remaining_work": 3.0
            }]
        }))
        .unwrap()
    }

    #[test]
    fn gossip_travels_one_hop_per_step() {
        let mut world = World::from_scenario(&chain_scenario(), 0).unwrap();
        let fact = TaskInfo { remaining_work: 1.0, status: TaskStatus::InProgress, timestamp: 1 };
        world.workers.get_mut(&0).unwrap().info.observe_task(9, fact);

        let mut sel = NoopSelector;
        world.step(&mut sel).unwrap();
        // worker 1 merged worker 0's committed fact; worker 2 merged worker
        // 1's *pre-step* state, which did not yet hold it
        assert_eq!(world.workers[&1].info.tasks.get(&9), Some(&fact));
        assert_eq!(world.workers[&2].info.tasks.get(&9), None);

        world.step(&mut sel).unwrap();
        assert_eq!(world.workers[&2].info.tasks.get(&9), Some(&fact));
    }

    #[test]
    fn makespan_uses_fallback_until_first_finish() {
        let mut world = World::from_scenario(&chain_scenario(), 0).unwrap();
        assert_eq!(world.get_makespan(99.0), 99.0);
        world.tasks.get_mut(&9).unwrap().apply_work(3.0, 4);
        assert_eq!(world.get_makespan(99.0), 4.0);
        assert!(world.all_tasks_done());
    }
}
