// src/lib.rs — Library root for promptprobe

pub mod cli;
pub mod core;
pub mod evaluator;
pub mod infra;
pub mod provider;
pub mod remote;
pub mod report;
pub mod suite;
pub mod util;
