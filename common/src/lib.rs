// Common library for the macro orchestration engine

pub mod bootstrap;
pub mod config;
pub mod dependency;
pub mod errors;
pub mod executor;
pub mod models;
pub mod orchestration;
pub mod plugin;
pub mod scheduler;
pub mod telemetry;
pub mod trigger;
