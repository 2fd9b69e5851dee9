//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_snapshot_adapter;
#[cfg(feature = "llm")]
pub mod llm_adapter;
pub mod sample_data;
