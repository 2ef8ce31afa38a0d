//! OIDC identity providers
//!
//! Issuer URLs, audiences and thumbprints for the CI systems that federate
//! through OpenID Connect.

mod issuer;

pub use issuer::{
    issuer_for, validate_org_name, OidcIssuer, GITHUB_ACTIONS_AUDIENCE, GITHUB_ACTIONS_HOST,
    TERRAFORM_CLOUD_AUDIENCE, TERRAFORM_CLOUD_HOST,
};
