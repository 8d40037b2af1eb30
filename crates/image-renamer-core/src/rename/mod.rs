// Rename pipeline: collision-free planning, then ordered execution
mod executor;
mod planner;

pub use executor::execute_renames;
pub use planner::plan_renames;
