use super::TaskSelector;
use crate::agents::{TaskStatus, WorkerMode, WorkerState};
use crate::sim::world::{World, dist};
use anyhow::Result;

/// Baseline greedy policy: every worker independently heads for the closest
/// task its local knowledge believes incomplete. No coordination, so two
/// workers will happily chase the same task.
#[derive(Debug, Default)]
pub struct NearestIncompleteTaskSelector;

impl NearestIncompleteTaskSelector {
    pub fn new() -> Self {
        Self
    }
}

impl TaskSelector for NearestIncompleteTaskSelector {
    fn assign_tasks(&mut self, world: &mut World) -> Result<()> {
        let ids: Vec<u32> = world.workers.keys().copied().collect();
        for wid in ids {
            let w = &world.workers[&wid];
            if matches!(w.mode, WorkerMode::GoRepair | WorkerMode::Repairing) {
                continue;
            }
            if w.state == WorkerState::Failed {
                let w = world.workers.get_mut(&wid).expect("worker registry is stable");
                w.mode = WorkerMode::GoRepair;
                w.target_task = None;
                continue;
            }

            let mut best: Option<(u32, f64)> = None;
            for (&tid, tinfo) in &w.info.tasks {
                if tinfo.status == TaskStatus::Done {
                    continue;
                }
                // positions are static ground truth; only progress is gossiped
                let Some(task) = world.tasks.get(&tid) else {
                    anyhow::bail!("nearest: task {} known to worker {} does not exist", tid, wid);
                };
                let d = dist(w.pos, task.pos);
                if best.map(|(_, bd)| d < bd).unwrap_or(true) {
                    best = Some((tid, d));
                }
            }

            let w = world.workers.get_mut(&wid).expect("worker registry is stable");
            match best {
                Some((tid, _)) => {
                    w.target_task = Some(tid);
                    w.mode = WorkerMode::Work;
                }
                None => {
                    w.target_task = None;
                    w.mode = WorkerMode::Idle;
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "nearest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::TaskInfo;
    use crate::sim::config::Scenario;
    use serde_json::json;

    fn world_with_two_tasks() -> World {
        let cfg: Scenario = serde_json::from_value(json!({
            "scenario_name": "nearest_test",
            "space": { "width": 100.0, "height": 100.0 },
            "sim": { "max_steps": 10, "time_step": 1.0 },
            "command_center": { "position": [0.0, 0.0] },
            "repair_depot": { "position": [0.0, 0.0], "repair_duration": 2.0 },
            "communication": { "range": 500.0 },
            "failure_model": { "name": "exponential", "params": { "lambda": 0.0 } },
            "task_selector": { "name": "nearest" },
            "workers": [{
                "id": 0, "position": [10.0, 0.0], "speed": 1.0, "throughput": 1.0,
                "speed_eta": 1.0, "throughput_eta": 1.0,
                "fatigue_move": 0.0, "fatigue_work": 0.0
            }],
            "tasks": [
                { "id": 1, "position": [12.0, 0.0], "total_work": 5.0, "remaining_work": 5.0 },
                { "id": 2, "position": [50.0, 0.0], "total_work": 5.0, "remaining_work": 5.0 }
            ]
        }))
        .unwrap();
        World::from_scenario(&cfg, 0).unwrap()
    }

    #[test]
    fn picks_closest_believed_incomplete() {
        let mut world = world_with_two_tasks();
        // seed local belief directly
        let w = world.workers.get_mut(&0).unwrap();
        for tid in [1u32, 2] {
            w.info.observe_task(
                tid,
                TaskInfo { remaining_work: 5.0, status: TaskStatus::Pending, timestamp: 0 },
            );
        }
        let mut sel = NearestIncompleteTaskSelector::new();
        sel.assign_tasks(&mut world).unwrap();
        assert_eq!(world.workers[&0].target_task, Some(1));
        assert_eq!(world.workers[&0].mode, WorkerMode::Work);

        // once the near task is believed done, the far one wins
        world.workers.get_mut(&0).unwrap().info.observe_task(
            1,
            TaskInfo { remaining_work: 0.0, status: TaskStatus::Done, timestamp: 1 },
        );
        sel.assign_tasks(&mut world).unwrap();
        assert_eq!(world.workers[&0].target_task, Some(2));
    }

    #[test]
    fn failed_worker_is_sent_to_repair() {
        let mut world = world_with_two_tasks();
        world.workers.get_mut(&0).unwrap().state = WorkerState::Failed;
        let mut sel = NearestIncompleteTaskSelector::new();
        sel.assign_tasks(&mut world).unwrap();
        assert_eq!(world.workers[&0].mode, WorkerMode::GoRepair);
        assert_eq!(world.workers[&0].target_task, None);
    }

    #[test]
    fn no_known_tasks_means_idle() {
        let mut world = world_with_two_tasks();
        let mut sel = NearestIncompleteTaskSelector::new();
        sel.assign_tasks(&mut world).unwrap();
        assert_eq!(world.workers[&0].mode, WorkerMode::Idle);
    }
}
