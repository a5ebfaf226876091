use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::TurnstileConfig;

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Outcome of a captcha check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// Captcha is disabled in config, nothing was checked.
    Skipped,
    Rejected(Vec<String>),
}

impl Verdict {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Passed | Self::Skipped)
    }
}

#[derive(Clone)]
pub struct TurnstileClient {
    client: Client,
}

impl TurnstileClient {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn verify(
        &self,
        config: &TurnstileConfig,
        token: Option<&str>,
        remote_ip: Option<&str>,
    ) -> Result<Verdict> {
        if !config.enabled {
            return Ok(Verdict::Skipped);
        }

        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Verdict::Rejected(vec!["missing-input-response".to_string()]));
        };

        let mut form = vec![
            ("secret", config.secret_key.as_str()),
            ("response", token),
        ];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let response: SiteverifyResponse = self
            .client
            .post(&config.verify_url)
            .form(&form)
            .send()
            .await
            .context("Failed to reach Turnstile")?
            .error_for_status()
            .context("Turnstile siteverify returned an error status")?
            .json()
            .await
            .context("Failed to decode Turnstile response")?;

        if response.success {
            debug!("Turnstile token accepted");
            Ok(Verdict::Passed)
        } else {
            warn!(codes = ?response.error_codes, "Turnstile token rejected");
            Ok(Verdict::Rejected(response.error_codes))
        }
    }
}
