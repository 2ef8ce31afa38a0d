//! cicd-trust-core: Platform-agnostic core of the CI/CD trust resolver
//!
//! Maps a module configuration to the IAM resources that let a CI/CD system
//! assume a deployment role: an OIDC provider (created or looked up), the role
//! and its trust document, and the Terraform backend policy. Also contains the
//! apply/destroy sequencing and the scenario harness. Engines are reached only
//! through the traits in [`platform`]; no cloud SDK is imported here.

pub mod apply;
pub mod config;
pub mod error;
pub mod harness;
pub mod oidc;
pub mod plan;
pub mod platform;
pub mod policy;
pub mod provider;

#[cfg(test)]
pub mod test_support;
