//! Terraform S3 backend access policy

use super::types::{PermissionPolicy, PermissionStatement};
use crate::config::ModuleConfig;
use crate::error::{Error, Result};

/// Build the inline policy that lets the role read and write Terraform state
/// and hold the state lock
pub fn compile_backend_policy(config: &ModuleConfig) -> Result<PermissionPolicy> {
    let backend = &config.s3_backend_config;
    let partition = &config.aws_partition;
    let bucket = backend.bucket_name(&config.name_prefix);
    let table = backend.lock_table_name(&config.name_prefix);

    if let Some(problem) = bucket_name_problem(&bucket) {
        return Err(match backend.bucket {
            Some(_) => Error::invalid_config(format!(
                "s3_backend_config bucket '{}' {}",
                bucket, problem
            )),
            None => derived_name_error(&config.name_prefix, "bucket", &bucket, problem),
        });
    }

    if let Some(problem) = table_name_problem(&table) {
        return Err(match backend.dynamodb_table {
            Some(_) => Error::invalid_config(format!(
                "s3_backend_config dynamodb_table '{}' {}",
                table, problem
            )),
            None => derived_name_error(&config.name_prefix, "dynamodb_table", &table, problem),
        });
    }

    let key_prefix = backend.key_prefix.trim_matches('/');
    let objects = if key_prefix.is_empty() {
        format!("arn:{}:s3:::{}/*", partition, bucket)
    } else {
        format!("arn:{}:s3:::{}/{}/*", partition, bucket, key_prefix)
    };

    Ok(PermissionPolicy {
        statements: vec![
            PermissionStatement {
                sid: "TerraformStateBucket".to_string(),
                actions: vec!["s3:ListBucket".to_string()],
                resources: vec![format!("arn:{}:s3:::{}", partition, bucket)],
            },
            PermissionStatement {
                sid: "TerraformStateObjects".to_string(),
                actions: vec![
                    "s3:GetObject".to_string(),
                    "s3:PutObject".to_string(),
                    "s3:DeleteObject".to_string(),
                ],
                resources: vec![objects],
            },
            PermissionStatement {
                sid: "TerraformStateLock".to_string(),
                actions: vec![
                    "dynamodb:DescribeTable".to_string(),
                    "dynamodb:GetItem".to_string(),
                    "dynamodb:PutItem".to_string(),
                    "dynamodb:DeleteItem".to_string(),
                ],
                resources: vec![format!("arn:{}:dynamodb:*:*:table/{}", partition, table)],
            },
        ],
    })
}

fn derived_name_error(name_prefix: &str, field: &str, derived: &str, problem: &str) -> Error {
    Error::invalid_config(format!(
        "name_prefix '{}' yields default {} '{}', which {}; choose a shorter lowercase name_prefix or set s3_backend_config.{}",
        name_prefix, field, derived, problem, field
    ))
}

/// Why `bucket` is not a usable S3 bucket name, if it isn't
fn bucket_name_problem(bucket: &str) -> Option<&'static str> {
    if bucket.len() < 3 || bucket.len() > 63 {
        return Some("must be 3-63 characters");
    }

    if bucket
        .chars()
        .any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.'))
    {
        return Some("may only contain lowercase letters, digits, '-' and '.'");
    }

    let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !edge_ok(bucket.chars().next()) || !edge_ok(bucket.chars().last()) {
        return Some("must begin and end with a lowercase letter or digit");
    }

    None
}

fn table_name_problem(table: &str) -> Option<&'static str> {
    if table.len() < 3 || table.len() > 255 {
        return Some("must be 3-255 characters");
    }

    if table
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'))
    {
        return Some("may only contain letters, digits, '_', '-' and '.'");
    }

    None
}
