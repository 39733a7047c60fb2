// Generational GA with tournament selection and elitism, minimizing the sum
// of an individual's objective vector. Deliberately narrow: any conforming
// metaheuristic could replace this behind the same evaluate-function seam.

use super::operators::{crossover, mutate, random_population};
use super::representation::Individual;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

pub type EvaluateFn<'a> = &'a (dyn Fn(&Individual) -> Vec<f64> + Sync);

pub struct SimpleGa<'a> {
    num_workers: usize,
    num_tasks: usize,
    l_max: usize,
    pop_size: usize,
    generations: usize,
    elitism_rate: f64,
    tournament_size: usize,
    mutation_rate: f64,
    evaluate: EvaluateFn<'a>,
    rng: StdRng,
}

impl<'a> SimpleGa<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_workers: usize,
        num_tasks: usize,
        l_max: usize,
        pop_size: usize,
        generations: usize,
        elitism_rate: f64,
        evaluate: EvaluateFn<'a>,
        seed: u64,
    ) -> Self {
        Self {
            num_workers,
            num_tasks,
            l_max,
            pop_size,
            generations,
            elitism_rate,
            tournament_size: 2,
            mutation_rate: 0.1,
            evaluate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn tournament_select<'p>(&mut self, population: &'p [Individual]) -> &'p Individual {
        let mut best: Option<&Individual> = None;
        for _ in 0..self.tournament_size {
            let cand = population.choose(&mut self.rng).expect("population is never empty");
            if best.map(|b| cand.fitness() < b.fitness()).unwrap_or(true) {
                best = Some(cand);
            }
        }
        best.expect("tournament size is at least one")
    }

    pub fn run(&mut self) -> Individual {
        let repair_prob = 1.0 / self.l_max.max(1) as f64;
        let mut population = random_population(
            self.pop_size,
            self.num_workers,
            self.num_tasks,
            self.l_max,
            repair_prob,
            &mut self.rng,
        );
        for ind in &mut population {
            ind.objectives = (self.evaluate)(ind);
        }

        let elite_k = ((self.pop_size as f64 * self.elitism_rate) as usize).max(1);

        for _gen in 0..self.generations {
            let mut elites = population.clone();
            elites.sort_by(|a, b| a.fitness().total_cmp(&b.fitness()));
            elites.truncate(elite_k);

            let need = self.pop_size.saturating_sub(elite_k);
            let mut offspring = Vec::with_capacity(need);
            for _ in 0..need {
                let p1 = self.tournament_select(&population).clone();
                let p2 = self.tournament_select(&population).clone();
                let mut child = crossover(&p1, &p2, &mut self.rng);
                mutate(&mut child, &mut self.rng, self.mutation_rate);
                child.objectives = (self.evaluate)(&child);
                offspring.push(child);
            }

            population = elites;
            population.append(&mut offspring);
        }

        population
            .into_iter()
            .min_by(|a, b| a.fitness().total_cmp(&b.fitness()))
            .expect("population is never empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // objective that prefers perfectly balanced routes
    fn balance_objective(ind: &Individual) -> Vec<f64> {
        let max = ind.routes.iter().map(|r| r.len()).max().unwrap_or(0);
        let min = ind.routes.iter().map(|r| r.len()).min().unwrap_or(0);
        vec![(max - min) as f64]
    }

    #[test]
    fn same_seed_same_result() {
        let run = || {
            SimpleGa::new(3, 9, 4, 20, 10, 0.1, &balance_objective, 42).run()
        };
        let a = run();
        let b = run();
        assert_eq!(a.routes, b.routes);
        assert_eq!(a.repairs, b.repairs);
    }

    #[test]
    fn optimizes_toward_balanced_routes() {
        let best = SimpleGa::new(3, 9, 4, 30, 40, 0.1, &balance_objective, 7).run();
        assert!(best.is_valid_partition(9));
        assert!(best.fitness() <= 1.0, "routes {:?}", best.routes);
    }

    #[test]
    fn result_carries_objectives() {
        let best = SimpleGa::new(2, 4, 3, 10, 5, 0.2, &balance_objective, 0).run();
        assert_eq!(best.objectives.len(), 1);
    }
}
