//! Trust document compilation
//!
//! Builds the provider-specific trust document, or validates a caller override.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::types::{ArnRef, AssumeAction, Condition, Principal, TrustDocument, TrustStatement};
use crate::config::ModuleConfig;
use crate::error::{Error, Result};
use crate::oidc::OidcIssuer;
use crate::provider::ProviderSelector;

pub const CODEBUILD_SERVICE: &str = "codebuild.amazonaws.com";
pub const SAML_AUDIENCE: &str = "https://signin.aws.amazon.com/saml";

/// Maximum size IAM accepts for a trust policy
const MAX_TRUST_POLICY_LENGTH: usize = 2048;

fn saml_arn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^arn:aws[a-z-]*:iam::\d{12}:saml-provider/[\w+=,.@-]{1,128}$")
            .expect("static regex")
    })
}

/// Parse an `assume_role_policy` override
pub fn compile_override(policy: &str) -> Result<TrustDocument> {
    let value: Value = serde_json::from_str(policy)
        .map_err(|e| Error::plan(format!("assume_role_policy is not valid JSON: {}", e)))?;

    // IAM counts the document without insignificant whitespace
    if value.to_string().len() > MAX_TRUST_POLICY_LENGTH {
        return Err(Error::plan(format!(
            "assume_role_policy is too long (max {} characters)",
            MAX_TRUST_POLICY_LENGTH
        )));
    }

    match value.get("Statement") {
        Some(Value::Array(statements)) if !statements.is_empty() => {}
        Some(Value::Object(_)) => {}
        _ => {
            return Err(Error::plan(
                "assume_role_policy must contain at least one Statement",
            ))
        }
    }

    Ok(TrustDocument::Custom(value))
}

/// Validate the fields a provider needs before anything is planned
pub fn validate_provider_fields(config: &ModuleConfig) -> Result<()> {
    let provider = config.cicd_provider;

    if provider.uses_oidc() {
        let org = config.git_provider_org.as_deref().unwrap_or("").trim();
        if org.is_empty() {
            return Err(Error::missing_field(
                provider.as_str(),
                "git_provider_org",
                "OIDC trust is scoped to an organization",
            ));
        }
        crate::oidc::validate_org_name(org)?;
    }

    if provider == ProviderSelector::Jenkins {
        let arn = config.saml_provider_arn.as_deref().unwrap_or("").trim();
        if arn.is_empty() {
            return Err(Error::missing_field(
                provider.as_str(),
                "saml_provider_arn",
                "SAML federation needs an existing identity provider",
            ));
        }
        if !saml_arn_regex().is_match(arn) {
            return Err(Error::invalid_config(format!(
                "saml_provider_arn '{}' is not a SAML provider ARN",
                arn
            )));
        }
    }

    let scoped_by_repository = matches!(
        provider,
        ProviderSelector::GithubActions | ProviderSelector::Bitbucket
    );
    if scoped_by_repository && config.git_repositories.is_empty() {
        return Err(Error::invalid_config(
            "git_repositories must list at least one repository (use \"*\" for all)",
        ));
    }

    Ok(())
}

/// Build the trust document for the configured provider.
///
/// `oidc_provider` is the identity provider the role federates with; it must be
/// set for OIDC providers and is ignored otherwise.
pub fn compile_trust_document(
    config: &ModuleConfig,
    oidc_provider: Option<(&OidcIssuer, ArnRef)>,
) -> Result<TrustDocument> {
    let org = config.git_provider_org.as_deref().unwrap_or("").trim();

    let statement = match config.cicd_provider {
        ProviderSelector::Codebuild => TrustStatement {
            principal: Principal::Service(CODEBUILD_SERVICE.to_string()),
            action: AssumeAction::AssumeRole,
            conditions: vec![],
        },
        ProviderSelector::Jenkins => {
            let arn = config.saml_provider_arn.as_deref().unwrap_or("").trim();
            TrustStatement {
                principal: Principal::Federated(ArnRef::Literal(arn.to_string())),
                action: AssumeAction::AssumeRoleWithSaml,
                conditions: vec![Condition::string_equals("SAML:aud", SAML_AUDIENCE)],
            }
        }
        provider => {
            let (issuer, arn) = oidc_provider.ok_or_else(|| {
                Error::internal(format!("no OIDC provider planned for {}", provider))
            })?;
            TrustStatement {
                principal: Principal::Federated(arn),
                action: AssumeAction::AssumeRoleWithWebIdentity,
                conditions: oidc_conditions(config, provider, issuer, org),
            }
        }
    };

    Ok(TrustDocument::Generated(statement))
}

fn oidc_conditions(
    config: &ModuleConfig,
    provider: ProviderSelector,
    issuer: &OidcIssuer,
    org: &str,
) -> Vec<Condition> {
    let audience = Condition::string_equals(issuer.claim_key("aud"), issuer.audience.clone());

    match provider {
        ProviderSelector::GithubActions => {
            let subjects = config
                .git_repositories
                .iter()
                .map(|repo| format!("repo:{}/{}:*", org, repo))
                .collect();
            vec![audience, Condition::string_like(issuer.claim_key("sub"), subjects)]
        }
        ProviderSelector::TerraformCloud => {
            let workspace = config
                .deployment_environment
                .as_deref()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .unwrap_or("*");
            let subject = format!(
                "organization:{}:project:*:workspace:{}:run_phase:*",
                org, workspace
            );
            vec![audience, Condition::string_like(issuer.claim_key("sub"), vec![subject])]
        }
        ProviderSelector::Bitbucket => {
            // Pipelines tokens carry `{repositoryUuid}:{stepUuid}` as the subject
            let subjects = config
                .git_repositories
                .iter()
                .map(|repo| format!("{}:*", repo))
                .collect();
            vec![audience, Condition::string_like(issuer.claim_key("sub"), subjects)]
        }
        _ => vec![audience],
    }
}
