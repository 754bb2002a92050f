//! Arrears snapshot ingestion, collection-letter numbering and recovery analytics
//! for residential and commercial properties.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
