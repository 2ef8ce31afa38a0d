//! Mock implementations of platform traits for testing

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::platform::{Environment, OidcProviderRequest, ProvisioningEngine, RoleRequest};

pub const MOCK_ACCOUNT_ID: &str = "123456789012";

/// Harness settings without retry delays
pub fn fast_harness_config() -> HarnessConfig {
    HarnessConfig {
        retry_delay: Duration::ZERO,
        ..HarnessConfig::default()
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    oidc_providers: BTreeMap<String, String>,
    roles: BTreeMap<String, String>,
    role_policies: BTreeMap<(String, String), String>,
    transient_failures: HashMap<String, (u32, String)>,
    permanent_failures: HashMap<String, String>,
}

/// In-memory identity service with injectable failures
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Register an OIDC provider that exists before the test runs
    pub fn seed_oidc_provider(&self, url: &str) {
        self.state
            .lock()
            .unwrap()
            .oidc_providers
            .insert(url.to_string(), oidc_arn(url));
    }

    /// Fail the next `times` calls of `operation` with `message`
    pub fn fail_transiently(&self, operation: &str, times: u32, message: &str) {
        self.state
            .lock()
            .unwrap()
            .transient_failures
            .insert(operation.to_string(), (times, message.to_string()));
    }

    /// Fail every call of `operation` with a non-retryable error
    pub fn fail_permanently(&self, operation: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .permanent_failures
            .insert(operation.to_string(), message.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    pub fn role_trust_policy(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().roles.get(name).cloned()
    }

    /// Number of providers, roles and policies currently present
    pub fn resource_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.oidc_providers.len() + state.roles.len() + state.role_policies.len()
    }

    /// Record the call and apply any injected failure
    fn enter(&self, operation: &str, detail: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{} {}", operation, detail).trim_end().to_string());

        if let Some(message) = state.permanent_failures.get(operation) {
            return Err(Error::apply(message.clone()));
        }

        if let Some((remaining, message)) = state.transient_failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::apply(message.clone()));
            }
        }

        Ok(())
    }
}

fn oidc_arn(url: &str) -> String {
    format!(
        "arn:aws:iam::{}:oidc-provider/{}",
        MOCK_ACCOUNT_ID,
        url.trim_start_matches("https://")
    )
}

#[async_trait(?Send)]
impl ProvisioningEngine for MockEngine {
    async fn init(&self) -> Result<()> {
        self.enter("init", "")
    }

    async fn create_oidc_provider(&self, request: &OidcProviderRequest<'_>) -> Result<String> {
        self.enter("create_oidc_provider", request.url)?;
        let mut state = self.state.lock().unwrap();
        if state.oidc_providers.contains_key(request.url) {
            return Err(Error::apply(format!(
                "EntityAlreadyExists: provider {} already exists",
                request.url
            )));
        }
        let arn = oidc_arn(request.url);
        state.oidc_providers.insert(request.url.to_string(), arn.clone());
        Ok(arn)
    }

    async fn lookup_oidc_provider(&self, url: &str) -> Result<String> {
        self.enter("lookup_oidc_provider", url)?;
        self.state
            .lock()
            .unwrap()
            .oidc_providers
            .get(url)
            .cloned()
            .ok_or_else(|| Error::apply(format!("NoSuchEntity: no OIDC provider for {}", url)))
    }

    async fn create_role(&self, request: &RoleRequest<'_>) -> Result<String> {
        self.enter("create_role", request.name)?;
        let mut state = self.state.lock().unwrap();
        if state.roles.contains_key(request.name) {
            return Err(Error::apply(format!(
                "EntityAlreadyExists: role {} already exists",
                request.name
            )));
        }
        state
            .roles
            .insert(request.name.to_string(), request.assume_role_policy.to_string());
        Ok(format!("arn:aws:iam::{}:role/{}", MOCK_ACCOUNT_ID, request.name))
    }

    async fn put_role_policy(&self, role: &str, name: &str, document: &str) -> Result<()> {
        self.enter("put_role_policy", &format!("{}/{}", role, name))?;
        let mut state = self.state.lock().unwrap();
        if !state.roles.contains_key(role) {
            return Err(Error::apply(format!("NoSuchEntity: role {} not found", role)));
        }
        state
            .role_policies
            .insert((role.to_string(), name.to_string()), document.to_string());
        Ok(())
    }

    async fn delete_role_policy(&self, role: &str, name: &str) -> Result<()> {
        self.enter("delete_role_policy", &format!("{}/{}", role, name))?;
        self.state
            .lock()
            .unwrap()
            .role_policies
            .remove(&(role.to_string(), name.to_string()));
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        self.enter("delete_role", name)?;
        self.state.lock().unwrap().roles.remove(name);
        Ok(())
    }

    async fn delete_oidc_provider(&self, arn: &str) -> Result<()> {
        self.enter("delete_oidc_provider", arn)?;
        self.state
            .lock()
            .unwrap()
            .oidc_providers
            .retain(|_, existing| existing.as_str() != arn);
        Ok(())
    }
}

/// Mock environment backed by an in-memory HashMap
pub struct MockEnv {
    vars: HashMap<String, String>,
}

impl MockEnv {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl Environment for MockEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        self.vars
            .get(name)
            .cloned()
            .ok_or_else(|| Error::internal(format!("variable '{}' not found", name)))
    }
}
