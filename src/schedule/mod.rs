//! Schedule Evaluator: a 60-second ticker that activates or deactivates
//! routing schedules against the router clock.

pub mod evaluator;

pub use evaluator::ScheduleEvaluator;
