// Reddit OAuth client: listings, inbox, mark-read and reply.
//
// A thin reqwest wrapper with one authenticated GET helper and one form
// POST helper. Access tokens come from the OAuth2 token endpoint (password
// grant when account credentials are configured, client-credentials grant
// otherwise) and are cached until shortly before they expire.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::debug;

use super::rate_limiter::{RateLimiter, REDDIT_REQUESTS_PER_SECOND};
use super::{Comment, InboxMessage, Platform, Submission};
use crate::config::Config;

pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com";
pub const DEFAULT_API_URL: &str = "https://oauth.reddit.com";

/// Refresh this long before the token actually expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Reddit caps listing pages at 100 items.
const MAX_LISTING_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Account credentials; `None` means app-only (read) access.
    pub account: Option<(String, String)>,
}

impl RedditCredentials {
    pub fn from_config(config: &Config) -> Self {
        let account = config
            .has_user_credentials()
            .then(|| (config.reddit_username.clone(), config.reddit_password.clone()));
        Self {
            client_id: config.reddit_client_id.clone(),
            client_secret: config.reddit_client_secret.clone(),
            account,
        }
    }
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    client: reqwest::Client,
    auth_url: String,
    api_url: String,
    credentials: RedditCredentials,
    token: Mutex<Option<CachedToken>>,
    limiter: RateLimiter,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials, user_agent: &str) -> Result<Self> {
        Self::with_urls(credentials, user_agent, DEFAULT_AUTH_URL, DEFAULT_API_URL)
    }

    /// Point the client at alternate endpoints (tests, proxies).
    pub fn with_urls(
        credentials: RedditCredentials,
        user_agent: &str,
        auth_url: &str,
        api_url: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
            token: Mutex::new(None),
            limiter: RateLimiter::new(REDDIT_REQUESTS_PER_SECOND),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(RedditCredentials::from_config(config), &config.user_agent)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let form: Vec<(&str, &str)> = match &self.credentials.account {
            Some((username, password)) => vec![
                ("grant_type", "password"),
                ("username", username.as_str()),
                ("password", password.as_str()),
            ],
            None => vec![("grant_type", "client_credentials")],
        };

        self.limiter.acquire().await;
        let response = self
            .client
            .post(format!("{}/api/v1/access_token", self.auth_url))
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&form)
            .send()
            .await
            .context("Token request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token endpoint returned {status}: {body}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to deserialize token response")?;
        if let Some(error) = token.error {
            anyhow::bail!("Token endpoint refused credentials: {error}");
        }
        let value = token
            .access_token
            .filter(|t| !t.is_empty())
            .context("Token response had no access_token")?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        debug!(lifetime_secs = lifetime.as_secs(), "Obtained Reddit access token");
        *cached = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        Ok(value)
    }

    /// Authenticated GET against the OAuth API host.
    async fn api_get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, &str)]) -> Result<T> {
        let token = self.access_token().await?;
        self.limiter.acquire().await;

        debug!(path, "Reddit GET request");
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Reddit request failed: {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Reddit {path} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {path} response"))
    }

    /// Authenticated form POST against the OAuth API host.
    async fn api_post(&self, path: &str, form: &[(&str, &str)]) -> Result<()> {
        let token = self.access_token().await?;
        self.limiter.acquire().await;

        debug!(path, "Reddit POST request");
        let response = self
            .client
            .post(format!("{}{}", self.api_url, path))
            .bearer_auth(token)
            .form(form)
            .send()
            .await
            .with_context(|| format!("Reddit request failed: {path}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Reddit {path} returned {status}: {body}");
        }
        Ok(())
    }

    fn require_account(&self, what: &str) -> Result<()> {
        if self.credentials.account.is_none() {
            anyhow::bail!("{what} needs REDDIT_USERNAME and REDDIT_PASSWORD");
        }
        Ok(())
    }
}

#[async_trait]
impl Platform for RedditClient {
    async fn recent_comments(&self, username: &str, limit: usize) -> Result<Vec<Comment>> {
        let limit = limit.clamp(1, MAX_LISTING_LIMIT).to_string();
        let listing: Listing<RawComment> = self
            .api_get(
                &format!("/user/{username}/comments"),
                &[("sort", "new"), ("limit", limit.as_str()), ("raw_json", "1")],
            )
            .await
            .with_context(|| format!("Failed to fetch comments for u/{username}"))?;
        Ok(listing.into_items().map(RawComment::into_comment).collect())
    }

    async fn recent_submissions(&self, username: &str, limit: usize) -> Result<Vec<Submission>> {
        let limit = limit.clamp(1, MAX_LISTING_LIMIT).to_string();
        let listing: Listing<RawSubmission> = self
            .api_get(
                &format!("/user/{username}/submitted"),
                &[("sort", "new"), ("limit", limit.as_str()), ("raw_json", "1")],
            )
            .await
            .with_context(|| format!("Failed to fetch submissions for u/{username}"))?;
        Ok(listing
            .into_items()
            .map(RawSubmission::into_submission)
            .collect())
    }

    async fn unread_messages(&self, limit: usize) -> Result<Vec<InboxMessage>> {
        self.require_account("Reading the inbox")?;
        let limit = limit.clamp(1, MAX_LISTING_LIMIT).to_string();
        let listing: Listing<RawMessage> = self
            .api_get("/message/unread", &[("limit", limit.as_str()), ("raw_json", "1")])
            .await
            .context("Failed to fetch unread messages")?;
        Ok(listing.into_items().map(RawMessage::into_message).collect())
    }

    async fn mark_read(&self, message: &InboxMessage) -> Result<()> {
        self.require_account("Marking messages read")?;
        self.api_post("/api/read_message", &[("id", message.id.as_str())])
            .await
            .with_context(|| format!("Failed to mark {} read", message.id))
    }

    async fn reply(&self, message: &InboxMessage, text: &str) -> Result<()> {
        self.require_account("Replying")?;
        self.api_post(
            "/api/comment",
            &[("api_type", "json"), ("thing_id", message.id.as_str()), ("text", text)],
        )
        .await
        .with_context(|| format!("Failed to reply to {}", message.id))
    }
}

// --- Wire types -------------------------------------------------------------

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Deserialize)]
struct ListingData<T> {
    children: Vec<Thing<T>>,
}

#[derive(Deserialize)]
struct Thing<T> {
    data: T,
}

impl<T> Listing<T> {
    fn into_items(self) -> impl Iterator<Item = T> {
        self.data.children.into_iter().map(|thing| thing.data)
    }
}

#[derive(Deserialize)]
struct RawComment {
    #[serde(default)]
    body: String,
    #[serde(default)]
    subreddit: String,
    created_utc: Option<f64>,
}

impl RawComment {
    fn into_comment(self) -> Comment {
        Comment {
            body: self.body,
            subreddit: self.subreddit,
            created_at: timestamp(self.created_utc),
        }
    }
}

#[derive(Deserialize)]
struct RawSubmission {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    subreddit: String,
    created_utc: Option<f64>,
}

impl RawSubmission {
    fn into_submission(self) -> Submission {
        Submission {
            title: self.title,
            selftext: self.selftext,
            subreddit: self.subreddit,
            created_at: timestamp(self.created_utc),
        }
    }
}

#[derive(Deserialize)]
struct RawMessage {
    name: String,
    author: Option<String>,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
    created_utc: Option<f64>,
}

impl RawMessage {
    fn into_message(self) -> InboxMessage {
        InboxMessage {
            id: self.name,
            author: self.author,
            subject: self.subject,
            body: self.body,
            created_at: timestamp(self.created_utc),
        }
    }
}

fn timestamp(created_utc: Option<f64>) -> Option<DateTime<Utc>> {
    created_utc.and_then(|secs| DateTime::from_timestamp(secs as i64, 0))
}
