pub mod config;
pub mod error;
pub mod incident_service;
pub mod ingest_service;
pub mod lifecycle;
pub mod normalizer;
pub mod registry;
pub mod report;
pub mod tag_policy;

#[cfg(test)]
mod test_support;
