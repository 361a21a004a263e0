//! Shared domain primitives for the static site and its hello endpoint.
//!
//! This crate owns the response contract, the declarative resource topology and
//! its CloudFormation rendering, and the asset deployment plan. It intentionally
//! excludes AWS SDK and Lambda runtime concerns.

pub mod assets;
pub mod contract;
pub mod cors;
pub mod fragment;
pub mod outputs;
pub mod template;
pub mod topology;
