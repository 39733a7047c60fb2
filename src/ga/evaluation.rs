// Plan objectives, computed against a frozen snapshot of the world taken at
// plan-refresh time. The planner sees ground truth; staleness is the
// executor's problem.

use super::representation::Individual;
use crate::sim::world::{Pos, World, dist};

#[derive(Debug, Clone, Copy)]
pub struct PlannedWorker {
    pub pos: Pos,
    pub speed: f64,
    pub throughput: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PlannedTask {
    pub pos: Pos,
    pub remaining: f64,
}

/// Frozen planning inputs, index-aligned with GA chromosomes: worker index i
/// is the i-th worker id in ascending order, likewise for tasks.
#[derive(Debug, Clone)]
pub struct PlanningSnapshot {
    pub workers: Vec<PlannedWorker>,
    pub tasks: Vec<PlannedTask>,
    pub depot: Pos,
    pub repair_duration: f64,
    pub l_max: usize,
    pub diagonal: f64,
}

impl PlanningSnapshot {
    pub fn capture(world: &World, l_max: usize) -> Self {
        Self {
            workers: world
                .workers
                .values()
                .map(|w| PlannedWorker { pos: w.pos, speed: w.speed, throughput: w.throughput })
                .collect(),
            tasks: world
                .tasks
                .values()
                .map(|t| PlannedTask { pos: t.pos, remaining: t.remaining_work })
                .collect(),
            depot: world.repair_depot,
            repair_duration: world.repair_duration,
            l_max,
            diagonal: (world.width * world.width + world.height * world.height).sqrt(),
        }
    }

    /// Estimated makespan: per worker, roll the route forward at nominal
    /// rates, including scheduled repair trips; take the slowest worker.
    /// Tasks already complete cost only the travel past them.
    pub fn estimated_makespan(&self, ind: &Individual) -> f64 {
        let mut makespan = 0.0f64;
        for (w, route) in ind.routes.iter().enumerate() {
            let worker = &self.workers[w];
            let flags = &ind.repairs[w];
            let mut t = 0.0f64;
            let mut pos = worker.pos;
            for (done_count, &task_idx) in route.iter().enumerate() {
                if flags.get(done_count).copied().unwrap_or(false) {
                    if worker.speed <= 0.0 {
                        return f64::INFINITY;
                    }
                    t += dist(pos, self.depot) / worker.speed + self.repair_duration;
                    pos = self.depot;
                }
                let task = &self.tasks[task_idx];
                if worker.speed <= 0.0 {
                    return f64::INFINITY;
                }
                t += dist(pos, task.pos) / worker.speed;
                pos = task.pos;
                if task.remaining > 0.0 {
                    if worker.throughput <= 0.0 {
                        return f64::INFINITY;
                    }
                    t += task.remaining / worker.throughput;
                }
            }
            makespan = makespan.max(t);
        }
        makespan
    }

    /// Out-of-bound penalty: the operators keep L_max soft, the objective
    /// makes it expensive. One space diagonal of travel per excess entry.
    pub fn out_of_bound_penalty(&self, ind: &Individual) -> f64 {
        ind.routes
            .iter()
            .map(|r| r.len().saturating_sub(self.l_max) as f64)
            .sum::<f64>()
            * self.diagonal
    }

    pub fn evaluate(&self, ind: &Individual) -> Vec<f64> {
        vec![self.estimated_makespan(ind), self.out_of_bound_penalty(ind)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::representation::Individual;

    fn snapshot() -> PlanningSnapshot {
        PlanningSnapshot {
            workers: vec![
                PlannedWorker { pos: (0.0, 0.0), speed: 10.0, throughput: 1.0 },
                PlannedWorker { pos: (100.0, 0.0), speed: 5.0, throughput: 2.0 },
            ],
            tasks: vec![
                PlannedTask { pos: (50.0, 0.0), remaining: 10.0 },
                PlannedTask { pos: (100.0, 0.0), remaining: 4.0 },
            ],
            depot: (0.0, 0.0),
            repair_duration: 5.0,
            l_max: 2,
            diagonal: 100.0,
        }
    }

    #[test]
    fn makespan_is_slowest_route() {
        let snap = snapshot();
        // worker 0 -> task 0 (5 + 10 = 15), worker 1 -> task 1 (0 + 2 = 2)
        let ind = Individual::new(vec![vec![0], vec![1]], vec![vec![false], vec![false]]);
        assert!((snap.estimated_makespan(&ind) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn repair_flag_adds_depot_trip() {
        let snap = snapshot();
        // repair before the first task: depot is the start, so only the
        // repair duration is added
        let ind = Individual::new(vec![vec![0], vec![1]], vec![vec![true], vec![false]]);
        assert!((snap.estimated_makespan(&ind) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn done_task_costs_only_travel() {
        let mut snap = snapshot();
        snap.tasks[0].remaining = 0.0;
        let ind = Individual::new(vec![vec![0], vec![]], vec![vec![false], vec![false]]);
        assert!((snap.estimated_makespan(&ind) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_route_is_penalized() {
        let snap = snapshot();
        let ind = Individual::new(
            vec![vec![0, 1], vec![]],
            vec![vec![false, false], vec![false]],
        );
        assert_eq!(snap.out_of_bound_penalty(&ind), 0.0);
        let ind3 = Individual::new(
            vec![vec![0, 1, 0], vec![]],
            vec![vec![false; 3], vec![false]],
        );
        assert_eq!(snap.out_of_bound_penalty(&ind3), 100.0);
    }
}
