//! Policy document type definitions

use serde_json::{json, Map, Value};

use crate::plan::ResourceAddress;

/// IAM policy language version used for every generated document
pub const POLICY_VERSION: &str = "2012-10-17";

/// Placeholder shown for attributes that only exist after apply
pub const KNOWN_AFTER_APPLY: &str = "(known after apply)";

/// STS action a trust statement allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssumeAction {
    AssumeRole,
    AssumeRoleWithWebIdentity,
    AssumeRoleWithSaml,
}

impl AssumeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssumeRole => "sts:AssumeRole",
            Self::AssumeRoleWithWebIdentity => "sts:AssumeRoleWithWebIdentity",
            Self::AssumeRoleWithSaml => "sts:AssumeRoleWithSAML",
        }
    }
}

/// An ARN that is either known now or produced by another planned resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArnRef {
    Literal(String),
    Resource(ResourceAddress),
}

impl ArnRef {
    /// Resolve to a concrete ARN using `bind` for resource references
    pub fn bind(&self, bind: &dyn Fn(&ResourceAddress) -> Option<String>) -> Option<String> {
        match self {
            Self::Literal(arn) => Some(arn.clone()),
            Self::Resource(address) => bind(address),
        }
    }
}

/// Who may assume the role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// OIDC or SAML identity provider
    Federated(ArnRef),
    /// AWS service, e.g. `codebuild.amazonaws.com`
    Service(String),
}

/// Single condition clause, e.g. `StringLike app.terraform.io:sub = [...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub operator: &'static str,
    pub key: String,
    pub values: Vec<String>,
}

impl Condition {
    pub fn string_equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operator: "StringEquals",
            key: key.into(),
            values: vec![value.into()],
        }
    }

    pub fn string_like(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            operator: "StringLike",
            key: key.into(),
            values,
        }
    }
}

/// Allow statement of a generated trust document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStatement {
    pub principal: Principal,
    pub action: AssumeAction,
    pub conditions: Vec<Condition>,
}

/// Trust policy attached to the role
#[derive(Debug, Clone, PartialEq)]
pub enum TrustDocument {
    /// Built from the provider template
    Generated(TrustStatement),
    /// Caller-supplied `assume_role_policy`, used as-is
    Custom(Value),
}

impl TrustDocument {
    /// Render with referenced ARNs bound by `bind`. Unbound references render
    /// as `(known after apply)`.
    pub fn to_json(&self, bind: &dyn Fn(&ResourceAddress) -> Option<String>) -> Value {
        match self {
            Self::Custom(value) => value.clone(),
            Self::Generated(statement) => {
                let principal = match &statement.principal {
                    Principal::Federated(arn) => json!({
                        "Federated": arn.bind(bind).unwrap_or_else(|| KNOWN_AFTER_APPLY.to_string())
                    }),
                    Principal::Service(service) => json!({ "Service": service }),
                };

                let mut rendered = Map::new();
                rendered.insert("Effect".to_string(), json!("Allow"));
                rendered.insert("Principal".to_string(), principal);
                rendered.insert("Action".to_string(), json!(statement.action.as_str()));
                if !statement.conditions.is_empty() {
                    rendered.insert(
                        "Condition".to_string(),
                        conditions_to_json(&statement.conditions),
                    );
                }

                json!({
                    "Version": POLICY_VERSION,
                    "Statement": [Value::Object(rendered)],
                })
            }
        }
    }

    /// Render for a plan, before any referenced resource exists
    pub fn to_plan_json(&self) -> Value {
        self.to_json(&|_| None)
    }

    /// Resource whose ARN the document depends on, if any
    pub fn dependency(&self) -> Option<&ResourceAddress> {
        match self {
            Self::Generated(TrustStatement {
                principal: Principal::Federated(ArnRef::Resource(address)),
                ..
            }) => Some(address),
            _ => None,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

/// Group conditions by operator; single values render as strings
fn conditions_to_json(conditions: &[Condition]) -> Value {
    let mut by_operator = Map::new();
    for condition in conditions {
        let entry = by_operator
            .entry(condition.operator.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let value = if condition.values.len() == 1 {
            json!(condition.values[0])
        } else {
            json!(condition.values)
        };
        if let Value::Object(map) = entry {
            map.insert(condition.key.clone(), value);
        }
    }
    Value::Object(by_operator)
}

/// Allow statement of a permissions policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatement {
    pub sid: String,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

/// Inline permissions policy attached to the role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPolicy {
    pub statements: Vec<PermissionStatement>,
}

impl PermissionPolicy {
    pub fn to_json(&self) -> Value {
        let statements: Vec<Value> = self
            .statements
            .iter()
            .map(|s| {
                json!({
                    "Sid": s.sid,
                    "Effect": "Allow",
                    "Action": s.actions,
                    "Resource": s.resources,
                })
            })
            .collect();

        json!({
            "Version": POLICY_VERSION,
            "Statement": statements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ResourceKind;

    fn oidc_statement() -> TrustStatement {
        TrustStatement {
            principal: Principal::Federated(ArnRef::Resource(ResourceAddress::new(
                ResourceKind::OidcProvider,
            ))),
            action: AssumeAction::AssumeRoleWithWebIdentity,
            conditions: vec![
                Condition::string_equals("app.terraform.io:aud", "aws.workload.identity"),
                Condition::string_like(
                    "app.terraform.io:sub",
                    vec!["organization:acme:project:*:workspace:*:run_phase:*".to_string()],
                ),
            ],
        }
    }

    #[test]
    fn test_generated_document_plan_json() {
        let document = TrustDocument::Generated(oidc_statement());
        let value = document.to_plan_json();

        assert_eq!(value["Version"], "2012-10-17");
        let statement = &value["Statement"][0];
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Action"], "sts:AssumeRoleWithWebIdentity");
        assert_eq!(statement["Principal"]["Federated"], KNOWN_AFTER_APPLY);
        assert_eq!(
            statement["Condition"]["StringEquals"]["app.terraform.io:aud"],
            "aws.workload.identity"
        );
    }

    #[test]
    fn test_generated_document_binds_reference() {
        let document = TrustDocument::Generated(oidc_statement());
        let arn = "arn:aws:iam::123456789012:oidc-provider/app.terraform.io";
        let value = document.to_json(&|address| {
            (address.kind == ResourceKind::OidcProvider).then(|| arn.to_string())
        });
        assert_eq!(value["Statement"][0]["Principal"]["Federated"], arn);
        assert!(document.dependency().is_some());
    }

    #[test]
    fn test_multiple_condition_values_render_as_array() {
        let condition = Condition::string_like(
            "token.actions.githubusercontent.com:sub",
            vec!["repo:o/a:*".to_string(), "repo:o/b:*".to_string()],
        );
        let value = conditions_to_json(&[condition]);
        assert!(value["StringLike"]["token.actions.githubusercontent.com:sub"].is_array());
    }

    #[test]
    fn test_service_principal_has_no_dependency() {
        let document = TrustDocument::Generated(TrustStatement {
            principal: Principal::Service("codebuild.amazonaws.com".to_string()),
            action: AssumeAction::AssumeRole,
            conditions: vec![],
        });
        let value = document.to_plan_json();
        assert_eq!(value["Statement"][0]["Principal"]["Service"], "codebuild.amazonaws.com");
        assert!(value["Statement"][0].get("Condition").is_none());
        assert!(document.dependency().is_none());
    }

    #[test]
    fn test_custom_document_is_verbatim() {
        let custom = json!({"Version": "2012-10-17", "Statement": []});
        let document = TrustDocument::Custom(custom.clone());
        assert_eq!(document.to_plan_json(), custom);
        assert!(document.is_custom());
    }

    #[test]
    fn test_permission_policy_json() {
        let policy = PermissionPolicy {
            statements: vec![PermissionStatement {
                sid: "StateBucketList".to_string(),
                actions: vec!["s3:ListBucket".to_string()],
                resources: vec!["arn:aws:s3:::state".to_string()],
            }],
        };
        let value = policy.to_json();
        assert_eq!(value["Statement"][0]["Sid"], "StateBucketList");
        assert_eq!(value["Statement"][0]["Action"][0], "s3:ListBucket");
    }
}
