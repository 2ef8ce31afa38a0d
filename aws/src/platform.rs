//! Process-level platform implementations

use cicd_trust_core::error::{Error, Result};
use cicd_trust_core::platform::Environment;

/// Environment backed by the process environment
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        std::env::var(name)
            .map_err(|_| Error::internal(format!("environment variable '{}' not set", name)))
    }
}
