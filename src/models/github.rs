use serde::{Deserialize, Serialize};

use crate::domain::ModuleId;
use crate::entities::module_github_sync;

use super::decode_list;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncError {
    pub at: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GithubSyncConfig {
    pub id: i32,
    pub module_id: ModuleId,
    pub owner: String,
    pub repo: String,
    pub enabled: bool,
    pub include_prereleases: bool,
    pub last_sync_at: Option<String>,
    pub last_release_tag: Option<String>,
    pub sync_errors: Vec<SyncError>,
    pub created_at: String,
    pub updated_at: String,
}

impl GithubSyncConfig {
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl TryFrom<module_github_sync::Model> for GithubSyncConfig {
    type Error = anyhow::Error;

    fn try_from(model: module_github_sync::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            module_id: ModuleId::new(model.module_id),
            sync_errors: decode_list(&model.sync_errors, "sync_errors")?,
            owner: model.owner,
            repo: model.repo,
            enabled: model.enabled,
            include_prereleases: model.include_prereleases,
            last_sync_at: model.last_sync_at,
            last_release_tag: model.last_release_tag,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Appends an error and drops the oldest entries beyond `cap`.
pub fn push_bounded(errors: &mut Vec<SyncError>, error: SyncError, cap: usize) {
    errors.push(error);
    if errors.len() > cap {
        let overflow = errors.len() - cap;
        errors.drain(..overflow);
    }
}

/// Masks a personal access token for display, keeping the type prefix and last 4 chars.
#[must_use]
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = match chars[..chars.len().min(12)].iter().rposition(|c| *c == '_') {
        Some(idx) => chars[..=idx].iter().collect(),
        None => chars[..2].iter().collect(),
    };
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(n: usize) -> SyncError {
        SyncError {
            at: format!("t{n}"),
            message: format!("failure {n}"),
        }
    }

    #[test]
    fn test_push_bounded_keeps_newest() {
        let mut errors = Vec::new();
        for n in 0..15 {
            push_bounded(&mut errors, err(n), 10);
            assert!(errors.len() <= 10);
        }
        assert_eq!(errors.len(), 10);
        assert_eq!(errors.first().unwrap().message, "failure 5");
        assert_eq!(errors.last().unwrap().message, "failure 14");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("ghp_1234567890abcdef"), "ghp_…cdef");
        assert_eq!(
            mask_token("github_pat_11ABCDEFG0123456789"),
            "github_pat_…6789"
        );
        assert_eq!(mask_token("short"), "*****");
        assert_eq!(mask_token("abcdefghijkl"), "ab…ijkl");
    }
}
