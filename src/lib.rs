pub mod activity;
pub mod aggregate;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod harvest;
pub mod metrics;
pub mod model;
pub mod report;
pub mod store;

pub use error::{CogitateError, Result};
