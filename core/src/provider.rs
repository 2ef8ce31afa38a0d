//! CI/CD provider selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// CI/CD system that will assume the provisioned role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderSelector {
    #[default]
    GithubActions,
    Bitbucket,
    Codebuild,
    Jenkins,
    TerraformCloud,
}

/// How a provider proves its identity to STS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustMechanism {
    /// Federated OIDC identity, `sts:AssumeRoleWithWebIdentity`
    Oidc,
    /// Federated SAML identity, `sts:AssumeRoleWithSAML`
    Saml,
    /// AWS service principal, `sts:AssumeRole`
    Service,
}

impl ProviderSelector {
    pub const ALL: [ProviderSelector; 5] = [
        Self::GithubActions,
        Self::Bitbucket,
        Self::Codebuild,
        Self::Jenkins,
        Self::TerraformCloud,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GithubActions => "github-actions",
            Self::Bitbucket => "bitbucket",
            Self::Codebuild => "codebuild",
            Self::Jenkins => "jenkins",
            Self::TerraformCloud => "terraform-cloud",
        }
    }

    pub fn mechanism(&self) -> TrustMechanism {
        match self {
            Self::GithubActions | Self::Bitbucket | Self::TerraformCloud => TrustMechanism::Oidc,
            Self::Jenkins => TrustMechanism::Saml,
            Self::Codebuild => TrustMechanism::Service,
        }
    }

    pub fn uses_oidc(&self) -> bool {
        self.mechanism() == TrustMechanism::Oidc
    }
}

impl fmt::Display for ProviderSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
                Error::invalid_config(format!(
                    "unknown cicd_provider '{}' (expected one of: {})",
                    s,
                    valid.join(", ")
                ))
            })
    }
}
