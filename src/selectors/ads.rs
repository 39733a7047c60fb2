// Decentralized local-auction allocation. Each triggered worker proposes its
// best-scoring task from purely local (possibly stale) knowledge, then
// resolves contention against the 1-hop neighbours currently holding the same
// task. Losers exclude the contested task for the rest of the step and retry,
// for at most `max_rounds` rounds. Convergence within one step is explicitly
// not guaranteed; leftover contention is retried on later steps.

use super::TaskSelector;
use crate::agents::{TaskStatus, WorkerMode, WorkerState};
use crate::sim::world::{World, dist};
use anyhow::{Result, bail};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

#[derive(Debug)]
pub struct AdsSelector {
    /// Weight of the information-staleness penalty in the claim score.
    alpha_risk: f64,
    max_rounds: u32,
    /// Previous failure-axis state per worker, for edge-triggered repair.
    prev_state: HashMap<u32, WorkerState>,
    /// Tasks a worker lost this step; reset every step.
    excluded: HashMap<u32, HashSet<u32>>,
}

impl AdsSelector {
    pub fn new(alpha_risk: f64, max_rounds: u32) -> Self {
        Self {
            alpha_risk,
            max_rounds,
            prev_state: HashMap::new(),
            excluded: HashMap::new(),
        }
    }

    /// Claim score: estimated completion time plus weighted information age.
    /// Lower is better.
    fn score(&self, world: &World, wid: u32, tid: u32) -> Result<f64> {
        let w = &world.workers[&wid];
        let Some(task) = world.tasks.get(&tid) else {
            bail!("ads: task {} not found in the registry (claimed by worker {})", tid, wid);
        };
        let Some(tinfo) = w.info.tasks.get(&tid) else {
            bail!("ads: worker {} holds no local info for candidate task {}", wid, tid);
        };

        // stage 1: travel, at a speed blended by the current failure odds
        let p_move = world.failure_model.failure_prob(w.h);
        let speed_eff = (1.0 - p_move) * w.speed + p_move * w.speed * w.speed_eta;
        if speed_eff <= 0.0 {
            return Ok(f64::INFINITY);
        }
        let move_time = dist(w.pos, task.pos) / speed_eff;

        // stage 2: work, with the odds updated for the wear of that travel
        let h_after_move = w.h + w.fatigue_move * move_time;
        let p_work = world.failure_model.failure_prob(h_after_move);
        let thr_eff = (1.0 - p_work) * w.throughput + p_work * w.throughput * w.throughput_eta;
        if thr_eff <= 0.0 {
            return Ok(f64::INFINITY);
        }
        let work_time = tinfo.remaining_work / thr_eff;

        let age = world.steps.saturating_sub(tinfo.timestamp) as f64;
        Ok(move_time + work_time + self.alpha_risk * age)
    }

    /// Locally believed incomplete tasks, minus this step's lost auctions.
    fn candidates(&self, world: &World, wid: u32) -> Vec<u32> {
        let w = &world.workers[&wid];
        let excluded = self.excluded.get(&wid);
        w.info
            .tasks
            .iter()
            .filter(|(_, tinfo)| tinfo.status != TaskStatus::Done)
            .map(|(&tid, _)| tid)
            .filter(|tid| excluded.map(|ex| !ex.contains(tid)).unwrap_or(true))
            .collect()
    }

    fn neighbors(&self, world: &World, wid: u32) -> Vec<u32> {
        let w = &world.workers[&wid];
        world
            .workers
            .iter()
            .filter(|&(&oid, other)| {
                oid != wid && dist(w.pos, other.pos) <= world.communication_range
            })
            .map(|(&oid, _)| oid)
            .collect()
    }

    /// Collect workers that need (re)allocation this step and route freshly
    /// failed ones to repair.
    fn collect_triggered(&mut self, world: &mut World) -> Result<BTreeSet<u32>> {
        let mut triggered = BTreeSet::new();
        let ids: Vec<u32> = world.workers.keys().copied().collect();

        for wid in ids {
            let (state, mode, target) = {
                let w = &world.workers[&wid];
                (w.state, w.mode, w.target_task)
            };
            let prev = self.prev_state.insert(wid, state).unwrap_or(state);

            if matches!(mode, WorkerMode::GoRepair | WorkerMode::Repairing) {
                continue;
            }

            // (T2) fresh failure: repair unconditionally, out of this round
            if prev == WorkerState::Healthy && state == WorkerState::Failed {
                let w = world.workers.get_mut(&wid).expect("worker registry is stable");
                w.target_task = None;
                w.mode = WorkerMode::GoRepair;
                debug!(worker = wid, "ads: failure detected, routing to repair");
                continue;
            }

            // (T1) idle hands
            if mode == WorkerMode::Idle {
                world.workers.get_mut(&wid).expect("worker registry is stable").target_task =
                    None;
                triggered.insert(wid);
                continue;
            }

            let Some(tid) = target else {
                bail!("ads: worker {} is in {} mode with no target task", wid, mode);
            };
            // (T1) current target believed finished
            let done = world.workers[&wid]
                .info
                .tasks
                .get(&tid)
                .map(|t| t.status == TaskStatus::Done)
                .unwrap_or(false);
            if done {
                world.workers.get_mut(&wid).expect("worker registry is stable").target_task =
                    None;
                triggered.insert(wid);
            }
        }
        Ok(triggered)
    }
}

impl TaskSelector for AdsSelector {
    fn assign_tasks(&mut self, world: &mut World) -> Result<()> {
        self.excluded.clear();

        let mut undecided = self.collect_triggered(world)?;

        for round in 0..self.max_rounds {
            if undecided.is_empty() {
                break;
            }
            debug!(round, undecided = undecided.len(), "ads: consensus round");

            // every undecided worker proposes exactly one best-scoring task
            let mut proposals: Vec<(u32, u32, f64)> = Vec::new();
            for wid in undecided.clone() {
                let cands = self.candidates(world, wid);
                if cands.is_empty() {
                    let w = world.workers.get_mut(&wid).expect("worker registry is stable");
                    w.target_task = None;
                    w.mode = WorkerMode::Idle;
                    undecided.remove(&wid);
                    continue;
                }
                let mut best_tid = cands[0];
                let mut best_score = f64::INFINITY;
                for tid in cands {
                    let s = self.score(world, wid, tid)?;
                    if s < best_score {
                        best_score = s;
                        best_tid = tid;
                    }
                }
                proposals.push((wid, best_tid, best_score));
            }

            // resolve each proposal against neighbours holding the same task;
            // strictly lower score dethrones the provisional winner, ties
            // favour the incumbent
            for (wid, tid, score) in proposals {
                let mut winner = wid;
                let mut winner_score = score;
                let mut losers: Vec<u32> = Vec::new();

                for nb in self.neighbors(world, wid) {
                    if world.workers[&nb].target_task != Some(tid) {
                        continue;
                    }
                    let nb_score = self.score(world, nb, tid)?;
                    if nb_score < winner_score {
                        losers.push(winner);
                        winner = nb;
                        winner_score = nb_score;
                    } else {
                        losers.push(nb);
                    }
                }

                if !world.tasks.contains_key(&tid) {
                    bail!("ads: contested task {} not found in the registry", tid);
                }

                {
                    let w = world.workers.get_mut(&winner).expect("worker registry is stable");
                    w.target_task = Some(tid);
                    w.mode = WorkerMode::Work;
                }
                undecided.remove(&winner);

                for lid in losers {
                    let lw = world.workers.get_mut(&lid).expect("worker registry is stable");
                    lw.target_task = None;
                    lw.mode = WorkerMode::Idle;
                    self.excluded.entry(lid).or_default().insert(tid);
                    undecided.insert(lid);
                }
            }
        }
        // anyone still undecided stays idle and retries on a later step
        Ok(())
    }

    fn name(&self) -> &str {
        "ads"
    }
}
