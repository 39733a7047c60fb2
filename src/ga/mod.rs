pub mod core;
pub mod evaluation;
pub mod operators;
pub mod representation;

pub use core::SimpleGa;
pub use evaluation::PlanningSnapshot;
pub use representation::Individual;
