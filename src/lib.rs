pub mod agents;
pub mod failure;
pub mod ga;
pub mod info;
pub mod metrics;
pub mod selectors;
pub mod sim;

pub use agents::{Commander, Task, Worker};
pub use failure::FailureModel;
pub use info::InfoState;
pub use selectors::TaskSelector;
pub use sim::{Scenario, Simulation, World};

pub mod prelude {
    pub use crate::agents::{Task, TaskStatus, Worker, WorkerMode, WorkerState};
    pub use crate::failure::FailureModel;
    pub use crate::info::InfoState;
    pub use crate::metrics::{RunReport, StepSnapshot};
    pub use crate::selectors::{SelectorParams, SelectorRegistry, TaskSelector};
    pub use crate::sim::{Scenario, Simulation, World};
}
