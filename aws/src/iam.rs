//! IAM provisioning engine backed by the AWS SDK

use async_trait::async_trait;
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iam::types::Tag;
use std::collections::BTreeMap;
use tracing::debug;

use cicd_trust_core::error::{Error, Result};
use cicd_trust_core::platform::{OidcProviderRequest, ProvisioningEngine, RoleRequest};

/// Error codes IAM returns for conditions that clear up on their own
const TRANSIENT_CODES: [&str; 3] = [
    "Throttling",
    "ServiceFailure",
    "ConcurrentModification",
];

const NOT_FOUND_CODE: &str = "NoSuchEntity";

pub struct IamEngine {
    client: aws_sdk_iam::Client,
}

impl IamEngine {
    /// Build a client from the default credential chain
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self {
            client: aws_sdk_iam::Client::new(&sdk_config),
        }
    }

    /// ARN of the OIDC provider registered for `url`, if any
    async fn find_oidc_provider(&self, url: &str) -> Result<Option<String>> {
        let wanted = url.trim_start_matches("https://");
        let listed = self
            .client
            .list_open_id_connect_providers()
            .send()
            .await
            .map_err(|e| engine_error("ListOpenIDConnectProviders", e))?;

        for entry in listed.open_id_connect_provider_list() {
            let Some(arn) = entry.arn() else { continue };
            let provider = self
                .client
                .get_open_id_connect_provider()
                .open_id_connect_provider_arn(arn)
                .send()
                .await
                .map_err(|e| engine_error("GetOpenIDConnectProvider", e))?;

            if provider.url().map(|u| u.trim_start_matches("https://")) == Some(wanted) {
                return Ok(Some(arn.to_string()));
            }
        }

        Ok(None)
    }
}

#[async_trait(?Send)]
impl ProvisioningEngine for IamEngine {
    async fn init(&self) -> Result<()> {
        // Any signed call proves the credential chain resolves
        self.client
            .list_open_id_connect_providers()
            .send()
            .await
            .map_err(|e| engine_error("ListOpenIDConnectProviders", e))?;
        debug!("IAM credentials resolved");
        Ok(())
    }

    async fn create_oidc_provider(&self, request: &OidcProviderRequest<'_>) -> Result<String> {
        let output = self
            .client
            .create_open_id_connect_provider()
            .url(request.url)
            .set_client_id_list(Some(request.client_ids.to_vec()))
            .set_thumbprint_list(Some(request.thumbprints.to_vec()))
            .set_tags(Some(to_tags(request.tags)?))
            .send()
            .await
            .map_err(|e| engine_error("CreateOpenIDConnectProvider", e))?;

        output
            .open_id_connect_provider_arn()
            .map(str::to_string)
            .ok_or_else(|| Error::apply("CreateOpenIDConnectProvider returned no ARN"))
    }

    async fn lookup_oidc_provider(&self, url: &str) -> Result<String> {
        self.find_oidc_provider(url)
            .await?
            .ok_or_else(|| Error::apply(format!("{}: no OIDC provider for {}", NOT_FOUND_CODE, url)))
    }

    async fn create_role(&self, request: &RoleRequest<'_>) -> Result<String> {
        let output = self
            .client
            .create_role()
            .role_name(request.name)
            .assume_role_policy_document(request.assume_role_policy)
            .set_tags(Some(to_tags(request.tags)?))
            .send()
            .await
            .map_err(|e| engine_error("CreateRole", e))?;

        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| Error::apply("CreateRole returned no role"))
    }

    async fn put_role_policy(&self, role: &str, name: &str, document: &str) -> Result<()> {
        self.client
            .put_role_policy()
            .role_name(role)
            .policy_name(name)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| engine_error("PutRolePolicy", e))?;
        Ok(())
    }

    async fn delete_role_policy(&self, role: &str, name: &str) -> Result<()> {
        let result = self
            .client
            .delete_role_policy()
            .role_name(role)
            .policy_name(name)
            .send()
            .await;
        ignore_not_found("DeleteRolePolicy", result)
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        let result = self.client.delete_role().role_name(name).send().await;
        ignore_not_found("DeleteRole", result)
    }

    async fn delete_oidc_provider(&self, arn: &str) -> Result<()> {
        let result = self
            .client
            .delete_open_id_connect_provider()
            .open_id_connect_provider_arn(arn)
            .send()
            .await;
        ignore_not_found("DeleteOpenIDConnectProvider", result)
    }
}

fn to_tags(tags: &BTreeMap<String, String>) -> Result<Vec<Tag>> {
    tags.iter()
        .map(|(key, value)| {
            Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|e| Error::internal(format!("invalid tag '{}': {}", key, e)))
        })
        .collect()
}

fn ignore_not_found<T, E, R>(operation: &str, result: std::result::Result<T, SdkError<E, R>>) -> Result<()>
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.code() == Some(NOT_FOUND_CODE) => {
            debug!(operation, "already deleted");
            Ok(())
        }
        Err(e) => Err(engine_error(operation, e)),
    }
}

/// Map an SDK failure to an apply error, flagging throttling and network
/// failures as retryable
fn engine_error<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let transient = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => true,
        _ => err.code().is_some_and(|code| TRANSIENT_CODES.contains(&code)),
    };
    let message = format!("{} failed: {}", operation, DisplayErrorContext(&err));

    if transient {
        Error::apply_transient(message)
    } else {
        Error::apply(message)
    }
}
