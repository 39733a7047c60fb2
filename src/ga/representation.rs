/// GA chromosome for the fleet plan. `routes[w]` is the ordered slice of task
/// *indices* worker `w` will visit; the union over all workers is a
/// set-partition of `0..num_tasks`. `repairs[w][c]` marks a preventive repair
/// trip to trigger once worker `w` has completed `c` of its route tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct Individual {
    pub routes: Vec<Vec<usize>>,
    pub repairs: Vec<Vec<bool>>,
    /// [estimated makespan, out-of-bound penalty]; lower is better.
    pub objectives: Vec<f64>,
}

impl Individual {
    pub fn new(routes: Vec<Vec<usize>>, repairs: Vec<Vec<bool>>) -> Self {
        Self { routes, repairs, objectives: Vec::new() }
    }

    /// Scalar fitness minimized by the GA.
    pub fn fitness(&self) -> f64 {
        self.objectives.iter().sum()
    }

    /// Checks the set-partition invariant over `num_tasks` tasks.
    pub fn is_valid_partition(&self, num_tasks: usize) -> bool {
        let mut seen = vec![false; num_tasks];
        let mut count = 0usize;
        for route in &self.routes {
            for &t in route {
                if t >= num_tasks || seen[t] {
                    return false;
                }
                seen[t] = true;
                count += 1;
            }
        }
        count == num_tasks
    }
}
