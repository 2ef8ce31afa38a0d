//! Record of what an apply actually created
//!
//! Destroy works from this record rather than from the plan, so resources
//! that already existed (or that a failed create never made) are left alone.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plan::{ResourceAddress, ResourceKind};

/// A resource created by an apply, with the identifiers needed to delete it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppliedResource {
    OidcProvider { url: String, arn: String },
    Role { name: String, arn: String },
    RolePolicy { role: String, name: String },
}

impl AppliedResource {
    pub fn address(&self) -> ResourceAddress {
        let kind = match self {
            Self::OidcProvider { .. } => ResourceKind::OidcProvider,
            Self::Role { .. } => ResourceKind::IamRole,
            Self::RolePolicy { .. } => ResourceKind::IamRolePolicy,
        };
        ResourceAddress::new(kind)
    }
}

/// Created resources in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedState {
    pub resources: Vec<AppliedResource>,
}

impl AppliedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub(crate) fn record(&mut self, resource: AppliedResource) {
        self.resources.push(resource);
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::invalid_config(format!("invalid state file: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::internal(format!("failed to serialize state: {}", e)))
    }
}
