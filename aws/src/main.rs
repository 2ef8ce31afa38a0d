//! cicd-trust-aws: CI/CD trust resolver - AWS IAM adapter
//!
//! Reads a module configuration, renders its plan, and optionally applies or
//! destroys it against IAM. Apply records what it created in a state file;
//! destroy deletes only what that file lists. Uses a single-threaded tokio
//! runtime (compatible with core's !Send async traits).

use anyhow::{bail, Context};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use cicd_trust_core::apply::{apply, destroy, with_retries, AppliedState};
use cicd_trust_core::config::{HarnessConfig, ModuleConfig};
use cicd_trust_core::error::{Error, ErrorResponse, Result};
use cicd_trust_core::plan::{render_destroy, render_plan, resolve};
use cicd_trust_core::platform::{Environment, ProvisioningEngine};

mod iam;
mod platform;

use iam::IamEngine;
use platform::ProcessEnv;

const DEFAULT_STATE_PATH: &str = "cicd-trust.state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Plan,
    Apply,
    Destroy,
}

impl std::str::FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "plan" => Ok(Self::Plan),
            "apply" => Ok(Self::Apply),
            "destroy" => Ok(Self::Destroy),
            other => bail!("CICD_TRUST_ACTION must be plan, apply or destroy, got '{}'", other),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cicd_trust_aws=info,cicd_trust_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let env = ProcessEnv;
    let path = env
        .get_var("CICD_TRUST_CONFIG")
        .context("CICD_TRUST_CONFIG must point to a module configuration file")?;
    let action: Action = env
        .get_var("CICD_TRUST_ACTION")
        .unwrap_or_else(|_| "plan".to_string())
        .parse()?;
    let harness = HarnessConfig::from_env(&env)?;
    let state_path = env
        .get_var("CICD_TRUST_STATE")
        .unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string());

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read module configuration {}", path))?;
    let module = ModuleConfig::from_yaml(&content)?;

    tracing::info!(
        config = %path,
        ?action,
        provider = %module.cicd_provider,
        name_prefix = %module.name_prefix,
        "cicd-trust-aws starting"
    );

    if let Err(e) = run(action, &module, &harness, &state_path).await {
        let body = ErrorResponse::from(&e);
        eprintln!("{}", serde_json::to_string(&body)?);
        return Err(e.into());
    }

    Ok(())
}

async fn run(
    action: Action,
    module: &ModuleConfig,
    harness: &HarnessConfig,
    state_path: &str,
) -> Result<()> {
    let plan = resolve(module)?;

    if action == Action::Plan {
        print!("{}", render_plan(&plan, &harness.module_path));
        return Ok(());
    }

    let engine = IamEngine::from_env().await;
    with_retries("init", harness, || engine.init()).await?;

    match action {
        Action::Apply => {
            print!("{}", render_plan(&plan, &harness.module_path));
            let mut state = read_state(state_path)?;
            let result = apply(&plan, &engine, harness, &mut state).await;
            write_state(state_path, &state)?;
            let outputs = result?;
            let json = serde_json::to_string_pretty(&outputs)
                .map_err(|e| Error::internal(format!("failed to serialize outputs: {}", e)))?;
            println!("{}", json);
        }
        Action::Destroy => {
            let mut state = read_state(state_path)?;
            print!("{}", render_destroy(&state, &harness.module_path));
            let result = destroy(&mut state, &engine, harness).await;
            write_state(state_path, &state)?;
            result?;
        }
        Action::Plan => {}
    }

    Ok(())
}

/// Load the record of created resources; a missing file means nothing was created
fn read_state(path: &str) -> Result<AppliedState> {
    match std::fs::read_to_string(path) {
        Ok(content) => AppliedState::from_json(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppliedState::new()),
        Err(e) => Err(Error::internal(format!("failed to read state {}: {}", path, e))),
    }
}

fn write_state(path: &str, state: &AppliedState) -> Result<()> {
    std::fs::write(path, state.to_json()?)
        .map_err(|e| Error::internal(format!("failed to write state {}: {}", path, e)))
}
