use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Scenario value consumed by the kernel. Loaded from JSON; every field maps
/// onto the external-interface contract of the simulation core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_name: String,
    pub space: SpaceConfig,
    pub sim: StepConfig,
    pub command_center: SiteConfig,
    pub repair_depot: RepairConfig,
    pub communication: CommConfig,
    pub failure_model: PluginConfig,
    pub task_selector: PluginConfig,
    pub workers: Vec<WorkerSpec>,
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceConfig {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub max_steps: u64,
    pub time_step: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub position: (f64, f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    pub position: (f64, f64),
    pub repair_duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommConfig {
    pub range: f64,
}

/// Name + flat parameter map, resolved against a registry at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default)]
    pub params: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub id: u32,
    pub position: (f64, f64),
    pub speed: f64,
    pub throughput: f64,
    pub speed_eta: f64,
    pub throughput_eta: f64,
    #[serde(default)]
    pub initial_h: f64,
    pub fatigue_move: f64,
    pub fatigue_work: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: u32,
    pub position: (f64, f64),
    pub total_work: f64,
    pub remaining_work: f64,
}

impl Scenario {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario file {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&raw)
            .with_context(|| format!("parsing scenario file {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Structural checks beyond what serde enforces. All failures here are
    /// fatal configuration errors.
    pub fn validate(&self) -> Result<()> {
        if self.space.width <= 0.0 || self.space.height <= 0.0 {
            bail!("scenario '{}': space must have positive extent", self.scenario_name);
        }
        if self.sim.time_step <= 0.0 {
            bail!("scenario '{}': time_step must be positive", self.scenario_name);
        }
        let inside = |p: (f64, f64)| {
            p.0 >= 0.0 && p.0 <= self.space.width && p.1 >= 0.0 && p.1 <= self.space.height
        };
        if !inside(self.command_center.position) {
            bail!("command center lies outside the space");
        }
        if !inside(self.repair_depot.position) {
            bail!("repair depot lies outside the space");
        }
        let mut seen = std::collections::BTreeSet::new();
        for w in &self.workers {
            if !seen.insert(w.id) {
                bail!("duplicate worker id {}", w.id);
            }
            if !inside(w.position) {
                bail!("worker {} starts outside the space", w.id);
            }
        }
        seen.clear();
        for t in &self.tasks {
            if !seen.insert(t.id) {
                bail!("duplicate task id {}", t.id);
            }
            if !inside(t.position) {
                bail!("task {} lies outside the space", t.id);
            }
            if t.remaining_work > t.total_work || t.remaining_work < 0.0 {
                bail!("task {}: remaining_work must be within [0, total_work]", t.id);
            }
        }
        Ok(())
    }
}
