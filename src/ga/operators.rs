// Variation operators. Every operator preserves the route set-partition
// invariant: each task index appears exactly once across all routes.

use super::representation::Individual;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Random initial population: tasks shuffled and dealt to uniformly chosen
/// workers; repair flags drawn per route position with `repair_prob`.
pub fn random_population(
    population_size: usize,
    num_workers: usize,
    num_tasks: usize,
    l_max: usize,
    repair_prob: f64,
    rng: &mut StdRng,
) -> Vec<Individual> {
    (0..population_size)
        .map(|_| random_individual(num_workers, num_tasks, l_max, repair_prob, rng))
        .collect()
}

fn random_individual(
    num_workers: usize,
    num_tasks: usize,
    l_max: usize,
    repair_prob: f64,
    rng: &mut StdRng,
) -> Individual {
    let mut order: Vec<usize> = (0..num_tasks).collect();
    order.shuffle(rng);

    let mut routes = vec![Vec::new(); num_workers];
    for t in order {
        // prefer workers with spare capacity; overflow spills to the least
        // loaded route and is charged by the out-of-bound objective
        let open: Vec<usize> =
            (0..num_workers).filter(|&w| routes[w].len() < l_max).collect();
        let w = if open.is_empty() {
            (0..num_workers)
                .min_by_key(|&w| routes[w].len())
                .expect("at least one worker")
        } else {
            open[rng.gen_range(0..open.len())]
        };
        routes[w].push(t);
    }

    let flags_len = l_max.max(1);
    let repairs = (0..num_workers)
        .map(|_| (0..flags_len).map(|_| rng.gen_range(0.0..1.0) < repair_prob).collect())
        .collect();

    Individual::new(routes, repairs)
}

/// Route-exchange crossover: the child starts as parent 1, one worker's route
/// is replaced by parent 2's, duplicates are pruned and orphaned tasks are
/// re-inserted at random positions. Repair flags are inherited per worker
/// from a uniformly chosen parent.
pub fn crossover(p1: &Individual, p2: &Individual, rng: &mut StdRng) -> Individual {
    let num_workers = p1.routes.len();
    let mut routes = p1.routes.clone();

    let swapped = rng.gen_range(0..num_workers);
    let incoming = p2.routes[swapped].clone();

    let mut covered = vec![false; total_tasks(&p1.routes)];
    for &t in &incoming {
        covered[t] = true;
    }
    for (w, route) in routes.iter_mut().enumerate() {
        if w == swapped {
            continue;
        }
        route.retain(|&t| !covered[t]);
        for &t in route.iter() {
            covered[t] = true;
        }
    }
    routes[swapped] = incoming;

    let orphans: Vec<usize> =
        (0..covered.len()).filter(|&t| !covered[t]).collect();
    for t in orphans {
        let w = rng.gen_range(0..num_workers);
        let at = rng.gen_range(0..=routes[w].len());
        routes[w].insert(at, t);
    }

    let repairs = (0..num_workers)
        .map(|w| {
            if rng.gen_range(0.0..1.0) < 0.5 {
                p1.repairs[w].clone()
            } else {
                p2.repairs[w].clone()
            }
        })
        .collect();

    Individual::new(routes, repairs)
}

/// In-place mutation: with `rate`, relocate one task or swap two tasks across
/// routes; independently, with `rate`, flip one repair flag.
pub fn mutate(ind: &mut Individual, rng: &mut StdRng, rate: f64) {
    if rng.gen_range(0.0..1.0) < rate {
        if rng.gen_range(0.0..1.0) < 0.5 {
            relocate_task(ind, rng);
        } else {
            swap_tasks(ind, rng);
        }
    }
    if rng.gen_range(0.0..1.0) < rate {
        let w = rng.gen_range(0..ind.repairs.len());
        if !ind.repairs[w].is_empty() {
            let i = rng.gen_range(0..ind.repairs[w].len());
            ind.repairs[w][i] = !ind.repairs[w][i];
        }
    }
}

fn relocate_task(ind: &mut Individual, rng: &mut StdRng) {
    let donors: Vec<usize> =
        (0..ind.routes.len()).filter(|&w| !ind.routes[w].is_empty()).collect();
    let Some(&from) = donors.as_slice().choose(rng) else {
        return;
    };
    let i = rng.gen_range(0..ind.routes[from].len());
    let task = ind.routes[from].remove(i);
    let to = rng.gen_range(0..ind.routes.len());
    let at = rng.gen_range(0..=ind.routes[to].len());
    ind.routes[to].insert(at, task);
}

fn swap_tasks(ind: &mut Individual, rng: &mut StdRng) {
    let occupied: Vec<usize> =
        (0..ind.routes.len()).filter(|&w| !ind.routes[w].is_empty()).collect();
    if occupied.len() < 2 {
        relocate_task(ind, rng);
        return;
    }
    let a = occupied[rng.gen_range(0..occupied.len())];
    let b = loop {
        let cand = occupied[rng.gen_range(0..occupied.len())];
        if cand != a {
            break cand;
        }
    };
    let ia = rng.gen_range(0..ind.routes[a].len());
    let ib = rng.gen_range(0..ind.routes[b].len());
    let ta = ind.routes[a][ia];
    ind.routes[a][ia] = ind.routes[b][ib];
    ind.routes[b][ib] = ta;
}

fn total_tasks(routes: &[Vec<usize>]) -> usize {
    routes.iter().map(|r| r.len()).sum()
}
