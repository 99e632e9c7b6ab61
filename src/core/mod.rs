// src/core/mod.rs — Execution engine, statistics and prompt templating

pub mod runner;
pub mod stats;
pub mod template;
pub mod types;
