// src/report/mod.rs — Result reporting: console, run logs, exports

pub mod console;
pub mod export;
pub mod log_file;
pub mod theme;

pub use console::{format_report, print_report};
pub use theme::Painter;
