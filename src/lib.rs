pub mod config;
pub mod dashboard;
pub mod error;
pub mod gate;
pub mod jobs;
pub mod orchestrator;
pub mod shutdown;
pub mod stats;

pub use error::{LabError, Result};
