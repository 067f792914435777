// Request/response protocol for on-demand classification.
//
// A small tagged schema: tool name → typed arguments → typed result, with
// validation at the boundary. Both the stdio MCP server and the HTTP API
// decode into ToolCall and hand it to ToolService; neither touches the core
// with raw JSON.

pub mod mcp;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::analysis::{AnalysisOutcome, AnalyzedItem, UserAggregator};
use crate::config::Config;
use crate::error::FailureKind;
use crate::toxicity::Label;

pub const DEFAULT_MAX_POSTS: i64 = 10;
pub const MAX_POSTS_LIMIT: i64 = 100;
/// Toxic items included in an analyze_user result.
pub const MAX_RETURNED_TOXIC_ITEMS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifyTextArgs {
    /// Anything that isn't a JSON string is treated as empty text.
    #[serde(default)]
    pub text: Value,
}

impl ClassifyTextArgs {
    pub fn text(&self) -> &str {
        self.text.as_str().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeUserArgs {
    pub username: String,
    #[serde(default = "default_max_posts")]
    pub max_posts: i64,
}

fn default_max_posts() -> i64 {
    DEFAULT_MAX_POSTS
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateArgs {
    pub token: String,
}

/// One request, tagged by tool name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    ClassifyText(ClassifyTextArgs),
    #[serde(alias = "analyze_reddit_user")]
    AnalyzeUser(AnalyzeUserArgs),
    Validate(ValidateArgs),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Classification {
        label: Label,
        score: f64,
    },
    UserAnalysis {
        username: String,
        total_count: usize,
        toxic_count: usize,
        toxicity_rate: Option<f64>,
        toxic_items: Vec<AnalyzedItem>,
    },
    Validation {
        valid: bool,
        owner_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("no recent activity found for u/{0}")]
    NoData(String),
    #[error("platform request failed: {0}")]
    Platform(String),
    #[error("invalid token")]
    Unauthorized,
}

impl ToolError {
    /// The `{error: string}` body returned to callers.
    pub fn body(&self) -> Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

impl From<FailureKind> for ToolError {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::InvalidInput(msg) => ToolError::InvalidInput(msg),
            FailureKind::Platform(msg) => ToolError::Platform(msg),
        }
    }
}

/// Executes tool calls against the aggregator and classifier.
#[derive(Clone)]
pub struct ToolService {
    aggregator: UserAggregator,
    api_token: String,
    owner_id: String,
}

impl ToolService {
    pub fn new(aggregator: UserAggregator, api_token: &str, owner_id: &str) -> Self {
        Self {
            aggregator,
            api_token: api_token.to_string(),
            owner_id: owner_id.to_string(),
        }
    }

    pub fn from_config(aggregator: UserAggregator, config: &Config) -> Self {
        Self::new(aggregator, &config.api_token, &config.owner_id)
    }

    /// Whether `token` matches the configured shared secret. Always false
    /// when no secret is configured.
    pub fn token_is_valid(&self, token: &str) -> bool {
        !self.api_token.is_empty() && constant_time_eq(token, &self.api_token)
    }

    pub fn requires_token(&self) -> bool {
        !self.api_token.is_empty()
    }

    pub async fn call(&self, call: ToolCall) -> Result<ToolOutput, ToolError> {
        match call {
            ToolCall::ClassifyText(args) => {
                let result = self.aggregator.classifier().classify(args.text()).await;
                Ok(ToolOutput::Classification {
                    label: result.label,
                    score: result.score,
                })
            }
            ToolCall::AnalyzeUser(args) => self.analyze_user(args).await,
            ToolCall::Validate(args) => {
                if self.token_is_valid(&args.token) {
                    Ok(ToolOutput::Validation {
                        valid: true,
                        owner_id: self.owner_id.clone(),
                    })
                } else {
                    Err(ToolError::Unauthorized)
                }
            }
        }
    }

    async fn analyze_user(&self, args: AnalyzeUserArgs) -> Result<ToolOutput, ToolError> {
        let username = args.username.trim();
        if username.is_empty() {
            return Err(ToolError::InvalidInput("username must not be empty".to_string()));
        }
        if !(1..=MAX_POSTS_LIMIT).contains(&args.max_posts) {
            return Err(ToolError::InvalidInput(format!(
                "max_posts must be between 1 and {MAX_POSTS_LIMIT} (received {})",
                args.max_posts
            )));
        }

        info!(username, max_posts = args.max_posts, "analyze_user request");
        match self
            .aggregator
            .analyze(username, args.max_posts as usize)
            .await
        {
            AnalysisOutcome::Report(report) => {
                let toxicity_rate = report.toxicity_rate();
                let mut toxic_items = report.toxic_items;
                toxic_items.truncate(MAX_RETURNED_TOXIC_ITEMS);
                Ok(ToolOutput::UserAnalysis {
                    username: report.username,
                    total_count: report.total_count,
                    toxic_count: report.toxic_count,
                    toxicity_rate,
                    toxic_items,
                })
            }
            AnalysisOutcome::Absent => Err(ToolError::NoData(username.to_string())),
            AnalysisOutcome::Failure(kind) => Err(kind.into()),
        }
    }
}

/// Constant-time string comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_tagged_calls() {
        let call: ToolCall = serde_json::from_value(json!({
            "name": "classify_text",
            "arguments": {"text": "hello"}
        }))
        .unwrap();
        assert!(matches!(call, ToolCall::ClassifyText(ref a) if a.text() == "hello"));

        let call: ToolCall = serde_json::from_value(json!({
            "name": "analyze_reddit_user",
            "arguments": {"username": "spez"}
        }))
        .unwrap();
        match call {
            ToolCall::AnalyzeUser(args) => {
                assert_eq!(args.username, "spez");
                assert_eq!(args.max_posts, DEFAULT_MAX_POSTS);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn non_string_text_is_empty() {
        let args: ClassifyTextArgs = serde_json::from_value(json!({"text": 42})).unwrap();
        assert_eq!(args.text(), "");
        let args: ClassifyTextArgs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(args.text(), "");
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let result = serde_json::from_value::<ToolCall>(json!({
            "name": "delete_everything",
            "arguments": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn error_body_shape() {
        assert_eq!(
            ToolError::NoData("ghost".into()).body(),
            json!({"error": "no recent activity found for u/ghost"})
        );
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(constant_time_eq("", ""));
    }
}
