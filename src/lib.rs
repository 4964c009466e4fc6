pub mod actor;
pub mod api;
pub mod client;
pub mod config;
pub mod driver;
pub mod errors;
pub mod example_files;
pub mod logging;
pub mod metrics;
pub mod outcome;
pub mod payload;
pub mod percentiles;
pub mod prompts;
pub mod stats;
pub mod task;
pub mod utils;
