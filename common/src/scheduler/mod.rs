// Scheduler module for macro lifecycle management

pub mod engine;

pub use engine::{MacroScheduler, SchedulerConfig, StartOutcome};
