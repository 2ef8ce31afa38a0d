//! Provisioning plans
//!
//! A [`ProvisionPlan`] is the full set of resources a configuration needs,
//! computed without touching any engine.

mod render;
mod resolve;

pub use render::{render_destroy, render_plan, PlanSummary};
pub use resolve::resolve;

use std::collections::BTreeMap;
use std::fmt;

use crate::policy::{PermissionPolicy, TrustDocument};

/// Kind of resource a plan entry materializes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    OidcProvider,
    OidcProviderLookup,
    IamRole,
    IamRolePolicy,
}

impl ResourceKind {
    /// AWS provider type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::OidcProvider | Self::OidcProviderLookup => "aws_iam_openid_connect_provider",
            Self::IamRole => "aws_iam_role",
            Self::IamRolePolicy => "aws_iam_role_policy",
        }
    }

    /// Managed resources are created and destroyed; lookups only read
    pub fn is_managed(&self) -> bool {
        !matches!(self, Self::OidcProviderLookup)
    }

    fn local_name(&self) -> &'static str {
        match self {
            Self::IamRolePolicy => "terraform_backend",
            _ => "cicd",
        }
    }
}

/// Address of a resource within the module, e.g. `aws_iam_role.cicd[0]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    pub kind: ResourceKind,
    pub name: &'static str,
    pub index: usize,
}

impl ResourceAddress {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            name: kind.local_name(),
            index: 0,
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.kind.is_managed() {
            f.write_str("data.")?;
        }
        write!(f, "{}.{}[{}]", self.kind.type_name(), self.name, self.index)
    }
}

/// Desired state of one resource
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    OidcProvider {
        url: String,
        client_ids: Vec<String>,
        thumbprints: Vec<String>,
        tags: BTreeMap<String, String>,
    },
    OidcProviderLookup {
        url: String,
    },
    IamRole {
        name: String,
        trust: TrustDocument,
        tags: BTreeMap<String, String>,
    },
    IamRolePolicy {
        name: String,
        role: String,
        policy: PermissionPolicy,
    },
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::OidcProvider { .. } => ResourceKind::OidcProvider,
            Self::OidcProviderLookup { .. } => ResourceKind::OidcProviderLookup,
            Self::IamRole { .. } => ResourceKind::IamRole,
            Self::IamRolePolicy { .. } => ResourceKind::IamRolePolicy,
        }
    }
}

/// Plan entry: an address plus the resource's desired state
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedResource {
    pub address: ResourceAddress,
    pub spec: ResourceSpec,
}

impl PlannedResource {
    pub fn new(spec: ResourceSpec) -> Self {
        Self {
            address: ResourceAddress::new(spec.kind()),
            spec,
        }
    }
}

/// Resources to create, in dependency order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProvisionPlan {
    pub resources: Vec<PlannedResource>,
}

impl ProvisionPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Number of resources an apply would create (lookups excluded)
    pub fn count_to_add(&self) -> usize {
        self.resources
            .iter()
            .filter(|r| r.address.kind.is_managed())
            .count()
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&PlannedResource> {
        self.resources.iter().find(|r| r.address.kind == kind)
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.get(kind).is_some()
    }

    /// Trust document of the planned role
    pub fn trust_document(&self) -> Option<&TrustDocument> {
        self.resources.iter().find_map(|r| match &r.spec {
            ResourceSpec::IamRole { trust, .. } => Some(trust),
            _ => None,
        })
    }
}
