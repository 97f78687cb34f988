//! Email identity gate in front of the dashboard
//!
//! Logins are two steps: check the address shape, then forward it to a
//! signup webhook as `{"email": ...}`. The webhook accepting with HTTP 200
//! (and nothing else) opens the gate. No address data flows into the
//! analysis itself.

use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Result, SerplensError};

/// Local part, "@", domain, ".", tld; no whitespace anywhere
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

const WEBHOOK_TIMEOUT_SECS: u64 = 10;

#[derive(Debug)]
pub struct IdentityGate {
    pattern: Regex,
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl IdentityGate {
    /// Build a gate. With `webhook_url` unset the gate runs in local mode
    /// and accepts any well-formed address without calling out.
    pub fn new(webhook_url: Option<String>) -> Result<Self> {
        let pattern = Regex::new(EMAIL_PATTERN)
            .map_err(|e| SerplensError::ConfigError(format!("bad email pattern: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            pattern,
            webhook_url,
            client,
        })
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Check the address shape and return the trimmed form
    pub fn validate(&self, email: &str) -> Result<String> {
        let trimmed = email.trim();
        if !self.pattern.is_match(trimmed) {
            return Err(SerplensError::InvalidEmail(email.to_string()));
        }
        Ok(trimmed.to_string())
    }

    /// Forward the address to the signup webhook. Success is exactly
    /// HTTP 200; any other status means the gate stays closed. A failed
    /// request (timeout, DNS, connection refused) is an error, not a
    /// rejection.
    pub async fn notify(&self, email: &str) -> Result<bool> {
        let Some(url) = self.webhook_url.as_deref() else {
            debug!("no webhook configured, accepting login locally");
            return Ok(true);
        };

        let payload = serde_json::json!({ "email": email });
        let response = self.client.post(url).json(&payload).send().await?;
        let accepted = response.status() == reqwest::StatusCode::OK;
        if !accepted {
            warn!(status = %response.status(), "signup webhook rejected login");
        }
        Ok(accepted)
    }
}
