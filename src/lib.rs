//! NPI reconciliation library - shared modules for all binaries.

pub mod config;
pub mod dataset;
pub mod enrich;
pub mod error;
pub mod index;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod npi;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod report;
pub mod safety;
pub mod schema;
pub mod scoring;
pub mod validate;
