//! Plan execution
//!
//! Applies a [`ProvisionPlan`] through a [`ProvisioningEngine`] in dependency
//! order, and tears down what it created in reverse.

mod retry;
mod state;

pub use retry::{is_transient, with_retries};
pub use state::{AppliedResource, AppliedState};

use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::plan::{ProvisionPlan, ResourceAddress, ResourceSpec};
use crate::platform::{OidcProviderRequest, ProvisioningEngine, RoleRequest};

/// Identifiers produced by an apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyOutputs {
    pub role_arn: Option<String>,
    pub role_name: Option<String>,
    /// Created or looked-up OIDC provider
    pub oidc_provider_arn: Option<String>,
    pub backend_policy_name: Option<String>,
}

/// Create every managed resource in `plan` and read every lookup.
///
/// Resources are visited in plan order, which the resolver guarantees is
/// dependency order: OIDC provider, role, role policy. Each resource is
/// recorded in `state` as soon as it exists, so a failure partway through
/// leaves exactly the created resources in `state` for [`destroy`].
pub async fn apply(
    plan: &ProvisionPlan,
    engine: &dyn ProvisioningEngine,
    config: &HarnessConfig,
    state: &mut AppliedState,
) -> Result<ApplyOutputs> {
    let mut outputs = ApplyOutputs::default();
    let mut arns: HashMap<ResourceAddress, String> = HashMap::new();

    for resource in &plan.resources {
        match &resource.spec {
            ResourceSpec::OidcProvider {
                url,
                client_ids,
                thumbprints,
                tags,
            } => {
                let request = OidcProviderRequest {
                    url,
                    client_ids,
                    thumbprints,
                    tags,
                };
                let arn = with_retries("create_oidc_provider", config, || {
                    engine.create_oidc_provider(&request)
                })
                .await?;
                info!(address = %resource.address, %arn, "created OIDC provider");
                state.record(AppliedResource::OidcProvider {
                    url: url.clone(),
                    arn: arn.clone(),
                });
                arns.insert(resource.address.clone(), arn.clone());
                outputs.oidc_provider_arn = Some(arn);
            }
            ResourceSpec::OidcProviderLookup { url } => {
                let arn = with_retries("lookup_oidc_provider", config, || {
                    engine.lookup_oidc_provider(url)
                })
                .await?;
                info!(address = %resource.address, %arn, "found existing OIDC provider");
                arns.insert(resource.address.clone(), arn.clone());
                outputs.oidc_provider_arn = Some(arn);
            }
            ResourceSpec::IamRole { name, trust, tags } => {
                if let Some(dependency) = trust.dependency() {
                    if !arns.contains_key(dependency) {
                        return Err(Error::internal(format!(
                            "role {} depends on {} which has not been applied",
                            name, dependency
                        )));
                    }
                }
                let document = trust.to_json(&|address| arns.get(address).cloned());
                let document = serde_json::to_string(&document).map_err(|e| {
                    Error::internal(format!("failed to serialize trust document: {}", e))
                })?;
                let request = RoleRequest {
                    name,
                    assume_role_policy: &document,
                    tags,
                };
                let arn =
                    with_retries("create_role", config, || engine.create_role(&request)).await?;
                info!(address = %resource.address, %arn, "created role");
                state.record(AppliedResource::Role {
                    name: name.clone(),
                    arn: arn.clone(),
                });
                arns.insert(resource.address.clone(), arn.clone());
                outputs.role_arn = Some(arn);
                outputs.role_name = Some(name.clone());
            }
            ResourceSpec::IamRolePolicy { name, role, policy } => {
                let document = policy.to_json().to_string();
                with_retries("put_role_policy", config, || {
                    engine.put_role_policy(role, name, &document)
                })
                .await?;
                info!(address = %resource.address, role = %role, "attached role policy");
                state.record(AppliedResource::RolePolicy {
                    role: role.clone(),
                    name: name.clone(),
                });
                outputs.backend_policy_name = Some(name.clone());
            }
        }
    }

    Ok(outputs)
}

/// Delete the resources recorded in `state`, newest first.
///
/// Keeps going after a failure so one stuck resource does not strand the
/// rest. Deleted resources are dropped from `state`; whatever could not be
/// deleted stays recorded and the first error is returned.
pub async fn destroy(
    state: &mut AppliedState,
    engine: &dyn ProvisioningEngine,
    config: &HarnessConfig,
) -> Result<()> {
    let mut first_error = None;
    let mut remaining = Vec::new();

    for resource in std::mem::take(&mut state.resources).into_iter().rev() {
        let result = match &resource {
            AppliedResource::RolePolicy { role, name } => {
                with_retries("delete_role_policy", config, || {
                    engine.delete_role_policy(role, name)
                })
                .await
            }
            AppliedResource::Role { name, .. } => {
                with_retries("delete_role", config, || engine.delete_role(name)).await
            }
            AppliedResource::OidcProvider { arn, .. } => {
                with_retries("delete_oidc_provider", config, || {
                    engine.delete_oidc_provider(arn)
                })
                .await
            }
        };

        match result {
            Ok(()) => info!(address = %resource.address(), "destroyed"),
            Err(e) => {
                warn!(address = %resource.address(), error = %e, "destroy failed");
                first_error.get_or_insert(e);
                remaining.push(resource);
            }
        }
    }

    remaining.reverse();
    state.resources = remaining;

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
