//! Policy documents
//!
//! Trust documents for the CI/CD role and the Terraform backend permissions policy.

mod backend;
mod compile;
pub mod types;

pub use backend::compile_backend_policy;
pub use compile::{
    compile_override, compile_trust_document, validate_provider_fields, CODEBUILD_SERVICE,
    SAML_AUDIENCE,
};
pub use types::{
    ArnRef, AssumeAction, Condition, PermissionPolicy, PermissionStatement, Principal,
    TrustDocument, TrustStatement, KNOWN_AFTER_APPLY,
};

use crate::error::{Error, Result};

/// Maximum IAM role name length
pub const MAX_ROLE_NAME_LENGTH: usize = 64;

/// Validate the name prefix used for every resource name.
/// IAM names allow alphanumerics and `+=,.@_-`.
pub fn validate_name_prefix(name_prefix: &str, role_name: &str) -> Result<()> {
    if name_prefix.is_empty() {
        return Err(Error::invalid_config("name_prefix cannot be empty"));
    }

    if role_name.len() > MAX_ROLE_NAME_LENGTH {
        return Err(Error::invalid_config(format!(
            "name_prefix too long: role name '{}' exceeds {} characters",
            role_name, MAX_ROLE_NAME_LENGTH
        )));
    }

    for c in name_prefix.chars() {
        if !c.is_ascii_alphanumeric() && !"+=,.@_-".contains(c) {
            return Err(Error::invalid_config(format!(
                "name_prefix contains invalid character: '{}'",
                c
            )));
        }
    }

    Ok(())
}
