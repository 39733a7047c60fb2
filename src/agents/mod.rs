pub mod commander;
pub mod task;
pub mod worker;

pub use commander::Commander;
pub use task::{Task, TaskStatus};
pub use worker::{StepCtx, Worker, WorkerMode, WorkerState};
