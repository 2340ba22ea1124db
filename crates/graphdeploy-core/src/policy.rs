//! Access policy for the deployment role.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::resolver::ResolverMap;

/// Services allowed to assume the deployment role.
pub const TRUSTED_SERVICES: [&str; 2] = ["lambda.amazonaws.com", "appsync.amazonaws.com"];

/// One access policy statement.
///
/// `Action` and `Resource` accept a single string or a list. Any other key
/// (`Condition`, `Principal`, `NotAction`, ...) is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(default = "default_effect")]
    pub effect: String,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub action: Vec<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub resource: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_effect() -> String {
    "Allow".to_string()
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

impl PolicyStatement {
    /// Creates an `Allow` statement.
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: default_effect(),
            action: actions.into_iter().map(Into::into).collect(),
            resource: resources.into_iter().map(Into::into).collect(),
            extra: BTreeMap::new(),
        }
    }
}

/// Statements every deployment role carries.
pub fn baseline_statements() -> Vec<PolicyStatement> {
    vec![
        PolicyStatement::allow(["sts:AssumeRole"], ["*"]),
        PolicyStatement::allow(
            [
                "logs:CreateLogGroup",
                "logs:CreateLogStream",
                "logs:PutLogEvents",
            ],
            ["*"],
        ),
        PolicyStatement::allow(
            [
                "ec2:CreateNetworkInterface",
                "ec2:DescribeNetworkInterfaces",
                "ec2:DeleteNetworkInterface",
            ],
            ["*"],
        ),
    ]
}

/// Minimum statements needed by the merged resolvers: one invocation
/// statement covering every delegated function.
pub fn resolver_statements(resolvers: &ResolverMap, region: &str) -> Vec<PolicyStatement> {
    let functions = resolvers.delegated_functions();
    if functions.is_empty() {
        return Vec::new();
    }

    let resources = functions
        .into_iter()
        .map(|name| format!("arn:aws:lambda:{region}:*:function:{name}"));
    vec![PolicyStatement::allow(["lambda:InvokeFunction"], resources)]
}

/// Full role policy: baseline, then resolver statements, then caller extras.
pub fn role_policy(
    resolvers: &ResolverMap,
    region: &str,
    extra: &[PolicyStatement],
) -> Vec<PolicyStatement> {
    let mut policy = baseline_statements();
    policy.extend(resolver_statements(resolvers, region));
    policy.extend(extra.iter().cloned());
    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolverDefinition;
    use serde_json::json;

    #[test]
    fn test_template_only_resolvers_need_no_invoke_statement() {
        let mut resolvers = ResolverMap::new();
        resolvers.insert("Query", "post", ResolverDefinition::template("req", None));

        assert!(resolver_statements(&resolvers, "us-east-1").is_empty());
        assert_eq!(role_policy(&resolvers, "us-east-1", &[]).len(), 3);
    }

    #[test]
    fn test_delegates_share_one_statement() {
        let mut resolvers = ResolverMap::new();
        resolvers.insert("Query", "a", ResolverDefinition::delegate("demo-x"));
        resolvers.insert("Query", "b", ResolverDefinition::delegate("demo-x"));
        resolvers.insert("Mutation", "c", ResolverDefinition::delegate("other"));

        let statements = resolver_statements(&resolvers, "eu-west-1");
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].action, vec!["lambda:InvokeFunction".to_string()]);
        assert_eq!(
            statements[0].resource,
            vec![
                "arn:aws:lambda:eu-west-1:*:function:demo-x".to_string(),
                "arn:aws:lambda:eu-west-1:*:function:other".to_string(),
            ]
        );
    }

    #[test]
    fn test_extra_statements_are_appended_last() {
        let extra = vec![PolicyStatement::allow(["dynamodb:GetItem"], ["arn:table/posts"])];
        let policy = role_policy(&ResolverMap::new(), "us-east-1", &extra);
        assert_eq!(policy.last(), Some(&extra[0]));
    }

    #[test]
    fn test_statement_wire_format() {
        let statement: PolicyStatement = serde_json::from_value(json!({
            "Action": ["s3:GetObject"],
            "Resource": ["*"]
        }))
        .unwrap();
        assert_eq!(statement.effect, "Allow");
    }

    #[test]
    fn test_single_string_action_and_resource() {
        let statement: PolicyStatement = serde_json::from_value(json!({
            "Action": "s3:GetObject",
            "Resource": "*"
        }))
        .unwrap();
        assert_eq!(statement, PolicyStatement::allow(["s3:GetObject"], ["*"]));
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let wire = json!({
            "Effect": "Deny",
            "NotAction": ["iam:*"],
            "Resource": ["*"],
            "Condition": { "Bool": { "aws:SecureTransport": "false" } }
        });
        let statement: PolicyStatement = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(statement.effect, "Deny");
        assert!(statement.action.is_empty());
        assert_eq!(statement.extra.len(), 2);

        let round_trip = serde_json::to_value(&statement).unwrap();
        assert_eq!(round_trip["Condition"], wire["Condition"]);
        assert_eq!(round_trip["NotAction"], wire["NotAction"]);
    }
}
