//! Trust policy resolution
//!
//! Maps a [`ModuleConfig`] to the [`ProvisionPlan`] that implements it.

use tracing::debug;

use super::{PlannedResource, ProvisionPlan, ResourceAddress, ResourceKind, ResourceSpec};
use crate::config::ModuleConfig;
use crate::error::Result;
use crate::oidc;
use crate::policy::{self, ArnRef};

/// Resolve a configuration into a plan.
///
/// Pure and deterministic. Every check runs before the first resource is
/// added, so an error never leaves a partial plan behind.
pub fn resolve(config: &ModuleConfig) -> Result<ProvisionPlan> {
    if !config.enabled {
        debug!(name_prefix = %config.name_prefix, "module disabled, planning nothing");
        return Ok(ProvisionPlan::empty());
    }

    let role_name = config.role_name();
    policy::validate_name_prefix(&config.name_prefix, &role_name)?;

    let backend_policy = if config.s3_backend_config.enabled {
        Some(policy::compile_backend_policy(config)?)
    } else {
        None
    };

    let tags = config.resource_tags();
    let mut oidc_resource = None;

    let trust = match config.assume_role_policy_override() {
        Some(custom) => {
            debug!(provider = %config.cicd_provider, "using assume_role_policy override");
            policy::compile_override(custom)?
        }
        None => {
            policy::validate_provider_fields(config)?;

            let org = config.git_provider_org.as_deref().unwrap_or("").trim();
            match oidc::issuer_for(config.cicd_provider, org)? {
                Some(issuer) => {
                    let spec = if config.create_oidc_provider {
                        ResourceSpec::OidcProvider {
                            url: issuer.url(),
                            client_ids: vec![issuer.audience.clone()],
                            thumbprints: issuer.thumbprints.clone(),
                            tags: tags.clone(),
                        }
                    } else {
                        ResourceSpec::OidcProviderLookup { url: issuer.url() }
                    };
                    let arn = ArnRef::Resource(ResourceAddress::new(spec.kind()));
                    let document = policy::compile_trust_document(config, Some((&issuer, arn)))?;
                    oidc_resource = Some(PlannedResource::new(spec));
                    document
                }
                None => policy::compile_trust_document(config, None)?,
            }
        }
    };

    let mut resources = Vec::with_capacity(3);
    resources.extend(oidc_resource);
    resources.push(PlannedResource::new(ResourceSpec::IamRole {
        name: role_name.clone(),
        trust,
        tags,
    }));
    if let Some(policy) = backend_policy {
        resources.push(PlannedResource::new(ResourceSpec::IamRolePolicy {
            name: config.backend_policy_name(),
            role: role_name,
            policy,
        }));
    }

    let plan = ProvisionPlan { resources };
    debug!(
        provider = %config.cicd_provider,
        to_add = plan.count_to_add(),
        oidc_lookup = plan.contains(ResourceKind::OidcProviderLookup),
        "resolved provision plan"
    );

    Ok(plan)
}
