//! Human-readable plan output
//!
//! Renders plans in the familiar Terraform layout so that scenario checks can
//! assert on addresses, attribute values and the change tally.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Write};

use super::{ProvisionPlan, ResourceAddress, ResourceSpec};
use crate::apply::{AppliedResource, AppliedState};
use crate::policy::KNOWN_AFTER_APPLY;

const NO_CHANGES: &str = "No changes. Your infrastructure matches the configuration.";
const NOTHING_TO_DESTROY: &str = "No changes. No objects need to be destroyed.";

/// Change tally printed at the end of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanSummary {
    pub to_add: usize,
    pub to_change: usize,
    pub to_destroy: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plan: {} to add, {} to change, {} to destroy.",
            self.to_add, self.to_change, self.to_destroy
        )
    }
}

enum Attr {
    Str(String),
    Unknown,
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Json(Value),
}

#[derive(Clone, Copy)]
enum Action {
    Create,
    Read,
    Destroy,
}

impl Action {
    fn marker(&self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Read => "<=",
            Self::Destroy => "-",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Self::Create => "will be created",
            Self::Read => "will be read during apply",
            Self::Destroy => "will be destroyed",
        }
    }
}

/// Render the plan for creating every resource in `plan`.
///
/// `module_path` prefixes each address (e.g. `module.main`); pass an empty
/// string for a root module.
pub fn render_plan(plan: &ProvisionPlan, module_path: &str) -> String {
    if plan.is_empty() {
        return format!("{}\n", NO_CHANGES);
    }

    let mut out = String::from("Terraform will perform the following actions:\n\n");
    for resource in &plan.resources {
        let action = if resource.address.kind.is_managed() {
            Action::Create
        } else {
            Action::Read
        };
        render_resource(
            &mut out,
            &resource.address,
            planned_attributes(&resource.spec),
            module_path,
            action,
        );
    }

    let summary = PlanSummary {
        to_add: plan.count_to_add(),
        ..PlanSummary::default()
    };
    let _ = writeln!(out, "{}", summary);
    out
}

/// Render the plan for destroying the resources recorded in `state`, newest
/// first
pub fn render_destroy(state: &AppliedState, module_path: &str) -> String {
    if state.is_empty() {
        return format!("{}\n", NOTHING_TO_DESTROY);
    }

    let mut out = String::from("Terraform will perform the following actions:\n\n");
    for resource in state.resources.iter().rev() {
        render_resource(
            &mut out,
            &resource.address(),
            applied_attributes(resource),
            module_path,
            Action::Destroy,
        );
    }

    let summary = PlanSummary {
        to_destroy: state.len(),
        ..PlanSummary::default()
    };
    let _ = writeln!(out, "{}", summary);
    out
}

fn render_resource(
    out: &mut String,
    address: &ResourceAddress,
    attrs: Vec<(&'static str, Attr)>,
    module_path: &str,
    action: Action,
) {
    let full_address = if module_path.is_empty() {
        address.to_string()
    } else {
        format!("{}.{}", module_path, address)
    };
    let block = if address.kind.is_managed() {
        "resource"
    } else {
        "data"
    };

    let _ = writeln!(out, "  # {} {}", full_address, action.verb());
    let _ = writeln!(
        out,
        "{:>3} {} \"{}\" \"{}\" {{",
        action.marker(),
        block,
        address.kind.type_name(),
        address.name
    );

    let width = attrs.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in &attrs {
        let _ = write!(out, "      {} {:<width$} = ", action.marker(), key, width = width);
        render_value(out, value, action);
    }
    out.push_str("    }\n\n");
}

fn applied_attributes(resource: &AppliedResource) -> Vec<(&'static str, Attr)> {
    match resource {
        AppliedResource::OidcProvider { url, arn } => vec![
            ("arn", Attr::Str(arn.clone())),
            ("url", Attr::Str(url.clone())),
        ],
        AppliedResource::Role { name, arn } => vec![
            ("arn", Attr::Str(arn.clone())),
            ("name", Attr::Str(name.clone())),
        ],
        AppliedResource::RolePolicy { role, name } => vec![
            ("name", Attr::Str(name.clone())),
            ("role", Attr::Str(role.clone())),
        ],
    }
}

fn planned_attributes(spec: &ResourceSpec) -> Vec<(&'static str, Attr)> {
    match spec {
        ResourceSpec::OidcProvider {
            url,
            client_ids,
            thumbprints,
            tags,
        } => vec![
            ("arn", Attr::Unknown),
            ("client_id_list", Attr::List(client_ids.clone())),
            ("tags", Attr::Map(tags.clone())),
            ("thumbprint_list", Attr::List(thumbprints.clone())),
            ("url", Attr::Str(url.clone())),
        ],
        ResourceSpec::OidcProviderLookup { url } => {
            vec![("arn", Attr::Unknown), ("url", Attr::Str(url.clone()))]
        }
        ResourceSpec::IamRole { name, trust, tags } => vec![
            ("arn", Attr::Unknown),
            ("assume_role_policy", Attr::Json(trust.to_plan_json())),
            ("name", Attr::Str(name.clone())),
            ("tags", Attr::Map(tags.clone())),
        ],
        ResourceSpec::IamRolePolicy { name, role, policy } => vec![
            ("name", Attr::Str(name.clone())),
            ("policy", Attr::Json(policy.to_json())),
            ("role", Attr::Str(role.clone())),
        ],
    }
}

fn render_value(out: &mut String, value: &Attr, action: Action) {
    let marker = action.marker();
    match value {
        Attr::Str(s) => {
            let _ = writeln!(out, "{:?}", s);
        }
        Attr::Unknown => {
            let _ = writeln!(out, "{}", KNOWN_AFTER_APPLY);
        }
        Attr::List(items) => {
            out.push_str("[\n");
            for item in items {
                let _ = writeln!(out, "          {} {:?},", marker, item);
            }
            out.push_str("        ]\n");
        }
        Attr::Map(map) => {
            out.push_str("{\n");
            let width = map.keys().map(|k| k.len() + 2).max().unwrap_or(0);
            for (key, val) in map {
                let quoted = format!("{:?}", key);
                let _ = writeln!(out, "          {} {:<width$} = {:?}", marker, quoted, val, width = width);
            }
            out.push_str("        }\n");
        }
        Attr::Json(json) => {
            let pretty = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());
            out.push_str("jsonencode(\n");
            for line in pretty.lines() {
                let _ = writeln!(out, "            {}", line);
            }
            out.push_str("        )\n");
        }
    }
}
