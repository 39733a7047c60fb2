pub mod ads;
pub mod ga;
pub mod nearest;

use crate::sim::world::World;
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;

/// Allocation policy: rewrites every worker's `target_task`/`mode` once per
/// step, after info commit and before physical execution. Implementations may
/// keep cross-step state (trigger memos, plans) but own no entities.
pub trait TaskSelector: Send + fmt::Debug {
    fn assign_tasks(&mut self, world: &mut World) -> Result<()>;
    fn name(&self) -> &str;
}

/// Typed view over a scenario's flat parameter map. Missing required
/// parameters are configuration errors.
#[derive(Debug, Clone, Default)]
pub struct SelectorParams {
    values: HashMap<String, f64>,
}

impl SelectorParams {
    pub fn new(values: HashMap<String, f64>) -> Self {
        Self { values }
    }

    pub fn require(&self, key: &str) -> Result<f64> {
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("selector missing required parameter '{}'", key))
    }

    pub fn get_or(&self, key: &str, default: f64) -> f64 {
        self.values.get(key).copied().unwrap_or(default)
    }
}

type SelectorFactory = Box<dyn Fn(&SelectorParams) -> Result<Box<dyn TaskSelector>> + Send + Sync>;

pub struct SelectorRegistry {
    factories: HashMap<String, SelectorFactory>,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        let mut registry = Self { factories: HashMap::new() };
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register("nearest", |_| Ok(Box::new(nearest::NearestIncompleteTaskSelector::new())));
        self.register("ads", |p| {
            Ok(Box::new(ads::AdsSelector::new(
                p.get_or("alpha_risk", 1.0),
                p.get_or("max_rounds", 3.0) as u32,
            )))
        });
        self.register("ga", |p| {
            let pop_size = p.get_or("pop_size", 40.0);
            if pop_size < 1.0 {
                anyhow::bail!("ga: pop_size must be at least 1");
            }
            let elitism_rate = p.get_or("elitism_rate", 0.1);
            if elitism_rate < 0.0 {
                anyhow::bail!("ga: elitism_rate must be non-negative");
            }
            Ok(Box::new(ga::GaSelector::new(ga::GaSelectorConfig {
                interval: p.require("interval")? as u64,
                pop_size: pop_size as usize,
                generations: p.get_or("generations", 60.0) as usize,
                elitism_rate,
                l_max: p.require("l_max")? as usize,
                seed: p.get_or("seed", 0.0) as u64,
                trials: p.get_or("trials", 5.0) as usize,
            })))
        });
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&SelectorParams) -> Result<Box<dyn TaskSelector>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_lowercase(), Box::new(factory));
    }

    pub fn create(&self, name: &str, params: &SelectorParams) -> Result<Box<dyn TaskSelector>> {
        match self.factories.get(&name.to_lowercase()) {
            Some(factory) => factory(params),
            None => anyhow::bail!("unknown task selector: {}", name),
        }
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn global() -> &'static SelectorRegistry {
        use std::sync::OnceLock;
        static REGISTRY: OnceLock<SelectorRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SelectorRegistry::new)
    }
}

impl Default for SelectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_selectors_resolve() {
        let reg = SelectorRegistry::global();
        assert_eq!(reg.list(), vec!["ads", "ga", "nearest"]);
        assert!(reg.create("NEAREST", &SelectorParams::default()).is_ok());
        assert!(reg.create("ads", &SelectorParams::default()).is_ok());
        assert!(reg.create("bogus", &SelectorParams::default()).is_err());
    }

    #[test]
    fn ga_selector_requires_core_params() {
        let reg = SelectorRegistry::global();
        assert!(reg.create("ga", &SelectorParams::default()).is_err());
        let mut values = HashMap::new();
        values.insert("interval".to_string(), 10.0);
        values.insert("l_max".to_string(), 4.0);
        assert!(reg.create("ga", &SelectorParams::new(values)).is_ok());
    }

    #[test]
    fn ga_selector_rejects_degenerate_population() {
        let reg = SelectorRegistry::global();
        let mut values = HashMap::new();
        values.insert("interval".to_string(), 10.0);
        values.insert("l_max".to_string(), 4.0);
        values.insert("pop_size".to_string(), 0.0);
        assert!(reg.create("ga", &SelectorParams::new(values.clone())).is_err());

        values.insert("pop_size".to_string(), 20.0);
        values.insert("elitism_rate".to_string(), -0.5);
        assert!(reg.create("ga", &SelectorParams::new(values)).is_err());
    }
}
