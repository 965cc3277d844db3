//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod json_file;
pub mod telemetry;
