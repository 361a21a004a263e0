//! AWS-oriented adapters, the hello handler and the provisioning run.
//!
//! This crate owns runtime integration details (the Lambda handler, the
//! CloudFormation and S3 adapter seams, and the sequential provisioning run)
//! on top of the pure topology in `site_serverless_core`.

pub mod adapters;
pub mod handlers;
pub mod provision;
pub mod settings;
