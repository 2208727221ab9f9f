// Library surface for the terminal client and the integration tests.
// Bin-only types (App, rendering) stay in main.rs and ui.rs.
pub mod app_dirs;
pub mod authoring;
pub mod config;
pub mod controller;
pub mod editing;
pub mod error;
pub mod history;
mod json_file;
pub mod library;
pub mod question;
pub mod resume;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod topic_store;
pub mod util;
pub mod write_back;
