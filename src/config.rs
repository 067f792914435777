use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

/// Which scoring oracle backs the classifier.
#[derive(Debug, Clone, PartialEq)]
pub enum ScorerBackend {
    /// Local ONNX model (default). Needs model files in `model_dir`
    Onnx,
    /// Keyword list. No model needed, low accuracy
    Keyword,
}

/// Central configuration loaded from environment variables.
///
/// All secrets come from env vars (never hardcoded). The .env file
/// is loaded automatically at startup via dotenvy. Every tunable has a
/// default; only the credentials are checked, and only by the commands
/// that need them (see `require_reddit_read` / `require_reddit_auth`).
#[derive(Debug, Clone)]
pub struct Config {
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_username: String,
    pub reddit_password: String,
    pub user_agent: String,

    pub scorer_backend: ScorerBackend,
    /// Directory containing `model.onnx` and `tokenizer.json`
    pub model_dir: PathBuf,
    /// Scores at or above this are labelled Toxic
    pub toxic_threshold: f64,
    /// Maximum tokens handed to the scoring oracle
    pub max_tokens: usize,

    /// Max comments and max submissions fetched per analyzed user
    pub max_items: usize,
    /// Unread messages fetched per monitor cycle
    pub inbox_limit: usize,
    pub poll_interval: Duration,
    pub retry_interval: Duration,
    pub message_pause: Duration,
    pub backoff_escalate: bool,
    pub backoff_max: Duration,
    /// Reply to the triggering message with the verdict
    pub reply_to_sender: bool,

    pub chunk_size: usize,
    pub text_column: String,

    /// Static shared secret for the request/response API
    pub api_token: String,
    /// Identifier handed back by the `validate` tool
    pub owner_id: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Absent tunables take their defaults. Unparsable tunables log a
    /// warning and also take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let scorer_backend = match get("TOXWATCH_SCORER").as_deref() {
            Some("keyword") => ScorerBackend::Keyword,
            Some("onnx") | None => ScorerBackend::Onnx,
            Some(other) => {
                warn!(value = other, "Unknown TOXWATCH_SCORER, using onnx");
                ScorerBackend::Onnx
            }
        };

        let model_dir = get("TOXWATCH_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_model_dir);

        let toxic_threshold: f64 = parse_or(&get, "TOXWATCH_TOXIC_THRESHOLD", 0.5);
        let toxic_threshold = if (0.0..=1.0).contains(&toxic_threshold) {
            toxic_threshold
        } else {
            warn!(value = toxic_threshold, "TOXWATCH_TOXIC_THRESHOLD out of range, using 0.5");
            0.5
        };

        Ok(Self {
            reddit_client_id: get("REDDIT_CLIENT_ID").unwrap_or_default(),
            reddit_client_secret: get("REDDIT_CLIENT_SECRET").unwrap_or_default(),
            reddit_username: get("REDDIT_USERNAME").unwrap_or_default(),
            reddit_password: get("REDDIT_PASSWORD").unwrap_or_default(),
            user_agent: get("REDDIT_USER_AGENT")
                .unwrap_or_else(|| format!("toxwatch/{}", env!("CARGO_PKG_VERSION"))),
            scorer_backend,
            model_dir,
            toxic_threshold,
            max_tokens: positive_or(&get, "TOXWATCH_MAX_TOKENS", 512),
            max_items: positive_or(&get, "TOXWATCH_MAX_ITEMS", 10),
            inbox_limit: positive_or(&get, "TOXWATCH_INBOX_LIMIT", 10),
            poll_interval: Duration::from_secs(parse_or(&get, "TOXWATCH_POLL_INTERVAL_SECS", 300)),
            retry_interval: Duration::from_secs(parse_or(
                &get,
                "TOXWATCH_RETRY_INTERVAL_SECS",
                60,
            )),
            message_pause: Duration::from_millis(parse_or(&get, "TOXWATCH_MESSAGE_PAUSE_MS", 1000)),
            backoff_escalate: parse_or(&get, "TOXWATCH_BACKOFF_ESCALATE", false),
            backoff_max: Duration::from_secs(parse_or(&get, "TOXWATCH_BACKOFF_MAX_SECS", 900)),
            reply_to_sender: parse_or(&get, "TOXWATCH_REPLY_TO_SENDER", false),
            chunk_size: positive_or(&get, "TOXWATCH_CHUNK_SIZE", 32),
            text_column: get("TOXWATCH_TEXT_COLUMN").unwrap_or_else(|| "comment_text".to_string()),
            api_token: get("TOXWATCH_API_TOKEN").unwrap_or_default(),
            owner_id: get("TOXWATCH_OWNER_ID").unwrap_or_default(),
        })
    }

    /// Check that app credentials for read-only Reddit access are configured.
    /// Call this before analyzing a user.
    pub fn require_reddit_read(&self) -> Result<()> {
        let missing = missing_vars(&[
            ("REDDIT_CLIENT_ID", &self.reddit_client_id),
            ("REDDIT_CLIENT_SECRET", &self.reddit_client_secret),
        ]);
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing environment variables: {}\n\
                 Add them to your .env file. See .env.example for details.",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// Check that full account credentials are configured.
    /// The inbox is only reachable as the bot user, so the monitor needs these.
    pub fn require_reddit_auth(&self) -> Result<()> {
        let missing = missing_vars(&[
            ("REDDIT_CLIENT_ID", &self.reddit_client_id),
            ("REDDIT_CLIENT_SECRET", &self.reddit_client_secret),
            ("REDDIT_USERNAME", &self.reddit_username),
            ("REDDIT_PASSWORD", &self.reddit_password),
        ]);
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing environment variables: {}\n\
                 Set them with: export REDDIT_CLIENT_ID=your_id (or add them to .env)",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// True when user credentials are present, i.e. we can act as the bot account.
    pub fn has_user_credentials(&self) -> bool {
        !self.reddit_username.is_empty() && !self.reddit_password.is_empty()
    }
}

/// Returns the default directory for storing model files.
/// Uses the platform data directory: ~/.local/share/toxwatch/models/ on Linux.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toxwatch")
        .join("models")
}

fn missing_vars(vars: &[(&'static str, &String)]) -> Vec<&'static str> {
    vars.iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| *name)
        .collect()
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, default = ?default, "Invalid value, using default");
                default
            }
        },
    }
}

fn positive_or<G>(get: &G, key: &str, default: usize) -> usize
where
    G: Fn(&str) -> Option<String>,
{
    match parse_or(get, key, default) {
        0 => {
            warn!(key, default, "Value must be positive, using default");
            default
        }
        n => n,
    }
}
