use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::GithubConfig;
use crate::constants::limits::GITHUB_RELEASES_PER_PAGE;
use crate::models::release::NewRelease;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("Invalid repository: {0}")]
    InvalidRepository(String),

    #[error("Repository {0} not found")]
    NotFound(String),

    #[error("GitHub rate limit exceeded")]
    RateLimited,

    #[error("GitHub returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub size: i64,
    pub browser_download_url: String,
    #[serde(default)]
    pub download_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubRelease {
    pub id: i64,
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    pub html_url: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

impl GithubRelease {
    /// First `.zip` asset, which is what root managers flash.
    #[must_use]
    pub fn zip_asset(&self) -> Option<&GithubAsset> {
        self.assets
            .iter()
            .find(|a| a.name.to_ascii_lowercase().ends_with(".zip"))
    }

    #[must_use]
    pub fn to_new_release(&self) -> NewRelease {
        let asset = self.zip_asset();
        NewRelease {
            version: self.tag_name.trim().to_string(),
            download_url: asset.map_or_else(
                || self.html_url.clone(),
                |a| a.browser_download_url.clone(),
            ),
            changelog: self.body.clone().filter(|b| !b.trim().is_empty()),
            size_bytes: asset.map(|a| a.size),
            github_release_id: Some(self.id),
        }
    }
}

/// Drops drafts, and prereleases unless asked for. Order is preserved.
#[must_use]
pub fn select_releases(
    releases: Vec<GithubRelease>,
    include_prereleases: bool,
) -> Vec<GithubRelease> {
    releases
        .into_iter()
        .filter(|r| !r.draft)
        .filter(|r| include_prereleases || !r.prerelease)
        .collect()
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Accepts `owner/repo` or a github.com URL (with optional `.git` suffix or deeper path).
pub fn parse_repo(input: &str) -> Result<(String, String), GithubError> {
    let invalid = || GithubError::InvalidRepository(input.to_string());
    let trimmed = input.trim();

    let segments: Vec<String> = if trimmed.contains("://") || trimmed.starts_with("github.com/") {
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        let url = url::Url::parse(&with_scheme).map_err(|_| invalid())?;
        match url.host_str() {
            Some("github.com" | "www.github.com") => {}
            _ => return Err(invalid()),
        }
        url.path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).take(2).map(str::to_string).collect())
            .unwrap_or_default()
    } else {
        let parts: Vec<&str> = trimmed.trim_matches('/').split('/').collect();
        if parts.len() != 2 {
            return Err(invalid());
        }
        parts.into_iter().map(str::to_string).collect()
    };

    let [owner, repo] = segments.as_slice() else {
        return Err(invalid());
    };
    let repo = repo.strip_suffix(".git").unwrap_or(repo);

    if !valid_segment(owner) || !valid_segment(repo) {
        return Err(invalid());
    }

    Ok((owner.clone(), repo.to_string()))
}

#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    api_base: String,
}

impl GithubClient {
    #[must_use]
    pub fn new(client: Client, config: &GithubConfig) -> Self {
        Self {
            client,
            api_base: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Most recent releases of a repository, newest first.
    pub async fn list_releases(
        &self,
        owner: &str,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Vec<GithubRelease>, GithubError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/releases?per_page={GITHUB_RELEASES_PER_PAGE}",
            self.api_base
        );

        debug!(owner, repo, authenticated = token.is_some(), "Fetching GitHub releases");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            request = request.bearer_auth(token.trim());
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            Ok(response.json().await?)
        } else if status == StatusCode::NOT_FOUND {
            Err(GithubError::NotFound(format!("{owner}/{repo}")))
        } else if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            Err(GithubError::RateLimited)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(GithubError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(
        tag: &str,
        draft: bool,
        prerelease: bool,
        assets: Vec<GithubAsset>,
    ) -> GithubRelease {
        GithubRelease {
            id: 1,
            tag_name: tag.to_string(),
            name: None,
            body: Some("changes".to_string()),
            draft,
            prerelease,
            html_url: format!("https://github.com/o/r/releases/tag/{tag}"),
            published_at: None,
            assets,
        }
    }

    fn asset(name: &str, size: i64) -> GithubAsset {
        GithubAsset {
            name: name.to_string(),
            size,
            browser_download_url: format!("https://github.com/o/r/releases/download/x/{name}"),
            download_count: 0,
        }
    }

    #[test]
    fn test_parse_repo_forms() {
        let expected = ("topjohnwu".to_string(), "Magisk".to_string());
        assert_eq!(parse_repo("topjohnwu/Magisk").unwrap(), expected);
        assert_eq!(parse_repo("https://github.com/topjohnwu/Magisk").unwrap(), expected);
        assert_eq!(parse_repo("https://github.com/topjohnwu/Magisk.git").unwrap(), expected);
        assert_eq!(
            parse_repo("https://www.github.com/topjohnwu/Magisk/releases/latest").unwrap(),
            expected
        );
        assert_eq!(parse_repo("github.com/topjohnwu/Magisk/").unwrap(), expected);
    }

    #[test]
    fn test_parse_repo_rejects() {
        assert!(parse_repo("").is_err());
        assert!(parse_repo("justowner").is_err());
        assert!(parse_repo("a/b/c").is_err());
        assert!(parse_repo("https://gitlab.com/owner/repo").is_err());
        assert!(parse_repo("https://github.com/owner").is_err());
        assert!(parse_repo("owner/re po").is_err());
    }

    #[test]
    fn test_select_releases_filters_drafts_and_prereleases() {
        let all = vec![
            release("v3-beta", false, true, vec![]),
            release("v2", false, false, vec![]),
            release("v2.1-draft", true, false, vec![]),
            release("v1", false, false, vec![]),
        ];

        let stable: Vec<String> = select_releases(all.clone(), false)
            .into_iter()
            .map(|r| r.tag_name)
            .collect();
        assert_eq!(stable, vec!["v2", "v1"]);

        let with_pre: Vec<String> = select_releases(all, true)
            .into_iter()
            .map(|r| r.tag_name)
            .collect();
        assert_eq!(with_pre, vec!["v3-beta", "v2", "v1"]);
    }

    #[test]
    fn test_download_url_prefers_zip_asset() {
        let r = release(
            "v1",
            false,
            false,
            vec![asset("checksums.txt", 10), asset("Module-v1.ZIP", 4096)],
        );
        let new = r.to_new_release();
        assert!(new.download_url.ends_with("Module-v1.ZIP"));
        assert_eq!(new.size_bytes, Some(4096));
        assert_eq!(new.github_release_id, Some(1));

        let bare = release("v1", false, false, vec![asset("notes.txt", 10)]);
        let new = bare.to_new_release();
        assert_eq!(new.download_url, "https://github.com/o/r/releases/tag/v1");
        assert_eq!(new.size_bytes, None);
    }
}
