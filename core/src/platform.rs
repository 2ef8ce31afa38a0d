//! Platform abstraction traits
//!
//! These traits define the boundary between the platform-agnostic resolver and
//! the engines that actually talk to a cloud identity service.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

/// OIDC identity provider to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcProviderRequest<'a> {
    pub url: &'a str,
    pub client_ids: &'a [String],
    pub thumbprints: &'a [String],
    pub tags: &'a BTreeMap<String, String>,
}

/// IAM role to create, with its trust document already bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequest<'a> {
    pub name: &'a str,
    pub assume_role_policy: &'a str,
    pub tags: &'a BTreeMap<String, String>,
}

/// Engine that performs idempotent create/read/delete calls against an
/// identity service.
///
/// Errors should be [`crate::error::Error::Apply`]; the message is matched
/// against the harness's retryable patterns. Deletes are only issued for
/// resources the engine created in this run, and deleting something that no
/// longer exists must succeed.
#[async_trait(?Send)]
pub trait ProvisioningEngine {
    /// Prepare the engine (credentials, plugins). Called once per run.
    async fn init(&self) -> Result<()>;

    /// Create an OIDC provider, returning its ARN
    async fn create_oidc_provider(&self, request: &OidcProviderRequest<'_>) -> Result<String>;

    /// Find an existing OIDC provider by issuer URL, returning its ARN
    async fn lookup_oidc_provider(&self, url: &str) -> Result<String>;

    /// Create a role, returning its ARN
    async fn create_role(&self, request: &RoleRequest<'_>) -> Result<String>;

    async fn put_role_policy(&self, role: &str, name: &str, document: &str) -> Result<()>;

    async fn delete_role_policy(&self, role: &str, name: &str) -> Result<()>;

    async fn delete_role(&self, name: &str) -> Result<()>;

    /// Delete an OIDC provider by the ARN its create returned
    async fn delete_oidc_provider(&self, arn: &str) -> Result<()>;
}

/// Environment variable access
pub trait Environment {
    fn get_var(&self, name: &str) -> Result<String>;
}
