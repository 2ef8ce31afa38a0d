//! Plan verification harness
//!
//! Runs init/plan(/apply)/destroy cycles for named scenarios against a
//! [`ProvisioningEngine`] and checks the rendered plan text. Each scenario
//! uses its own name prefix so several can run side by side.

use futures::future::join_all;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::apply::{apply, destroy, with_retries, AppliedState, ApplyOutputs};
use crate::config::{HarnessConfig, ModuleConfig};
use crate::error::{Error, Result};
use crate::plan::{render_plan, resolve, ProvisionPlan};
use crate::platform::ProvisioningEngine;

const UNIQUE_ID_LENGTH: usize = 10;

/// Unique resource prefix for one scenario run, e.g. `gha-3f9c0a1b2d`
pub fn generate_name_prefix(short: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", short, &id[..UNIQUE_ID_LENGTH])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScenarioMode {
    /// init, plan, destroy
    #[default]
    PlanOnly,
    /// init, plan, apply, destroy
    Apply,
}

/// Assertion on the rendered plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    Contains(String),
    NotContains(String),
    /// Exactly this many resources added and nothing changed or destroyed
    ResourceCount(usize),
    NoChanges,
}

impl Expectation {
    pub fn contains(text: impl Into<String>) -> Self {
        Self::Contains(text.into())
    }

    pub fn not_contains(text: impl Into<String>) -> Self {
        Self::NotContains(text.into())
    }

    pub fn check(&self, output: &PlanOutput) -> Result<()> {
        match self {
            Self::Contains(text) if !output.contains(text) => Err(Error::expectation_failed(
                format!("plan output does not contain '{}'", text),
            )),
            Self::NotContains(text) if output.contains(text) => Err(Error::expectation_failed(
                format!("plan output unexpectedly contains '{}'", text),
            )),
            Self::ResourceCount(count) => {
                let tally = format!("{} to add, 0 to change, 0 to destroy", count);
                if output.contains(&tally) {
                    Ok(())
                } else {
                    Err(Error::expectation_failed(format!(
                        "expected '{}', plan adds {}",
                        tally,
                        output.count_to_add()
                    )))
                }
            }
            Self::NoChanges if !output.contains("No changes.") => Err(
                Error::expectation_failed("expected no changes, but the plan has actions"),
            ),
            _ => Ok(()),
        }
    }
}

/// One named configuration to verify
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub config: ModuleConfig,
    pub mode: ScenarioMode,
    pub expectations: Vec<Expectation>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, config: ModuleConfig) -> Self {
        Self {
            name: name.into(),
            config,
            mode: ScenarioMode::default(),
            expectations: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: ScenarioMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }
}

/// What a scenario produced
#[derive(Debug, Clone)]
pub struct PlanOutput {
    pub text: String,
    pub plan: ProvisionPlan,
    /// Only set for [`ScenarioMode::Apply`]
    pub outputs: Option<ApplyOutputs>,
}

impl PlanOutput {
    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    pub fn count_to_add(&self) -> usize {
        self.plan.count_to_add()
    }
}

/// Run one scenario end to end.
///
/// Destroy runs on every exit path, including init, resolution and
/// expectation failures. It removes only what this run's apply created, so a
/// plan-only scenario leaves the account untouched. A destroy error is
/// returned only when the scenario itself succeeded.
pub async fn run_scenario(
    scenario: &Scenario,
    engine: &dyn ProvisioningEngine,
    config: &HarnessConfig,
) -> Result<PlanOutput> {
    let span = info_span!("scenario", name = %scenario.name, prefix = %scenario.config.name_prefix);
    async {
        let mut state = AppliedState::new();
        let result = execute(scenario, engine, config, &mut state).await;
        let teardown = destroy(&mut state, engine, config).await;

        match (result, teardown) {
            (Ok(output), Ok(())) => {
                info!(to_add = output.count_to_add(), "scenario passed");
                Ok(output)
            }
            (Ok(_), Err(e)) => {
                error!(error = %e, left = state.len(), "destroy failed");
                Err(e)
            }
            (Err(e), teardown) => {
                if let Err(destroy_err) = teardown {
                    error!(error = %destroy_err, left = state.len(), "destroy failed after scenario error");
                }
                error!(error = %e, "scenario failed");
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

async fn execute(
    scenario: &Scenario,
    engine: &dyn ProvisioningEngine,
    config: &HarnessConfig,
    state: &mut AppliedState,
) -> Result<PlanOutput> {
    with_retries("init", config, || engine.init()).await?;

    let plan = resolve(&scenario.config)?;
    let text = render_plan(&plan, &config.module_path);

    let outputs = match scenario.mode {
        ScenarioMode::PlanOnly => None,
        ScenarioMode::Apply => Some(apply(&plan, engine, config, state).await?),
    };

    let output = PlanOutput {
        text,
        plan,
        outputs,
    };

    for expectation in &scenario.expectations {
        expectation.check(&output).map_err(|e| match e {
            Error::ExpectationFailed { message } => {
                Error::expectation_failed(format!("{}: {}", scenario.name, message))
            }
            other => other,
        })?;
    }

    Ok(output)
}

/// Run independent scenarios concurrently, each against its own engine.
/// Results are returned in input order.
pub async fn run_scenarios<'a>(
    runs: &[(&'a Scenario, &'a dyn ProvisioningEngine)],
    config: &HarnessConfig,
) -> Vec<Result<PlanOutput>> {
    join_all(
        runs.iter()
            .map(|(scenario, engine)| run_scenario(scenario, *engine, config)),
    )
    .await
}
