use serde::Serialize;

use super::ApiError;
use crate::constants::{
    ANDROID_VERSIONS, MODULE_CATEGORIES, ROOT_METHODS,
    api_keys::MAX_EXPIRY_DAYS,
    limits::{MAX_FEATURES, MAX_PAGE_SIZE, MAX_RELEASES_PER_SUBMISSION},
};
use crate::domain::{ApiScope, ModuleWarning};
use crate::models::module::{ModuleDraft, ModulePatch};
use crate::models::release::{NewRelease, ReleasePatch};

/// One failed rule, addressed by the JSON path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub label: String,
    pub message: String,
}

/// Collects every failure instead of stopping at the first one.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, label: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            label: label.to_string(),
            message: message.into(),
        });
    }

    /// Checks the trimmed character count.
    pub fn length(
        &mut self,
        field: impl Into<String>,
        label: &str,
        value: &str,
        min: usize,
        max: usize,
    ) {
        let len = value.trim().chars().count();
        if len == 0 && min > 0 {
            self.push(field, label, format!("{label} is required"));
        } else if len < min || len > max {
            self.push(
                field,
                label,
                format!("{label} must be between {min} and {max} characters"),
            );
        }
    }

    pub fn max_length(&mut self, field: impl Into<String>, label: &str, value: &str, max: usize) {
        if value.trim().chars().count() > max {
            self.push(field, label, format!("{label} must be at most {max} characters"));
        }
    }

    pub fn http_url(&mut self, field: impl Into<String>, label: &str, value: &str) {
        if !is_http_url(value) {
            self.push(field, label, format!("{label} must be a valid http(s) URL"));
        }
    }

    pub fn one_of(&mut self, field: impl Into<String>, label: &str, value: &str, allowed: &[&str]) {
        if !allowed.contains(&value) {
            self.push(
                field,
                label,
                format!("{label} must be one of: {}", allowed.join(", ")),
            );
        }
    }

    /// Non-empty list whose entries all come from `allowed`.
    pub fn subset(&mut self, field: &str, label: &str, values: &[String], allowed: &[&str]) {
        if values.is_empty() {
            self.push(field, label, format!("Select at least one {}", label.to_lowercase()));
            return;
        }
        for (idx, value) in values.iter().enumerate() {
            if !allowed.contains(&value.as_str()) {
                self.push(
                    format!("{field}[{idx}]"),
                    label,
                    format!("Unknown {}: {value}", label.to_lowercase()),
                );
            }
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::InvalidFields(self.errors))
        }
    }
}

#[must_use]
pub fn is_http_url(value: &str) -> bool {
    url::Url::parse(value.trim())
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

pub fn validate_module_draft(v: &mut Validator, draft: &ModuleDraft) {
    v.length("name", "Name", &draft.name, 3, 100);
    v.length("short_description", "Short description", &draft.short_description, 10, 200);
    v.length("description", "Description", &draft.description, 20, 5000);
    v.length("author", "Author", &draft.author, 2, 50);
    v.one_of("category", "Category", &draft.category, MODULE_CATEGORIES);
    v.length("license", "License", &draft.license, 1, 50);
    v.subset("android_versions", "Android version", &draft.android_versions, ANDROID_VERSIONS);
    v.subset("root_methods", "Root method", &draft.root_methods, ROOT_METHODS);
    validate_features(v, &draft.features);
    v.http_url("source_url", "Source URL", &draft.source_url);
    if let Some(icon) = &draft.icon_url {
        v.http_url("icon_url", "Icon URL", icon);
    }
}

fn validate_features(v: &mut Validator, features: &[String]) {
    if features.len() > MAX_FEATURES {
        v.push(
            "features",
            "Features",
            format!("At most {MAX_FEATURES} features are allowed"),
        );
    }
    for (idx, feature) in features.iter().enumerate() {
        v.length(format!("features[{idx}]"), "Feature", feature, 1, 100);
    }
}

pub fn validate_release(v: &mut Validator, prefix: &str, release: &NewRelease) {
    validate_version(v, &format!("{prefix}version"), &release.version);
    v.http_url(format!("{prefix}download_url"), "Download URL", &release.download_url);
    if let Some(changelog) = &release.changelog {
        v.max_length(format!("{prefix}changelog"), "Changelog", changelog, 10_000);
    }
    if release.size_bytes.is_some_and(|s| s < 0) {
        v.push(format!("{prefix}size_bytes"), "Size", "Size cannot be negative");
    }
}

fn validate_version(v: &mut Validator, field: &str, version: &str) {
    v.length(field, "Version", version, 1, 50);
    if version.trim().chars().any(char::is_whitespace) {
        v.push(field, "Version", "Version cannot contain whitespace");
    }
}

pub fn validate_submitted_releases(v: &mut Validator, releases: &[NewRelease]) {
    if releases.len() > MAX_RELEASES_PER_SUBMISSION {
        v.push(
            "releases",
            "Releases",
            format!("At most {MAX_RELEASES_PER_SUBMISSION} releases can be submitted"),
        );
    }
    for (idx, release) in releases.iter().enumerate() {
        validate_release(v, &format!("releases[{idx}]."), release);
    }

    let mut seen = std::collections::HashSet::new();
    for (idx, release) in releases.iter().enumerate() {
        if !seen.insert(release.version.trim()) {
            v.push(
                format!("releases[{idx}].version"),
                "Version",
                format!("Duplicate version {}", release.version.trim()),
            );
        }
    }
}

pub fn validate_release_patch(v: &mut Validator, patch: &ReleasePatch) {
    if let Some(version) = &patch.version {
        validate_version(v, "version", version);
    }
    if let Some(url) = &patch.download_url {
        v.http_url("download_url", "Download URL", url);
    }
    if let Some(Some(changelog)) = &patch.changelog {
        v.max_length("changelog", "Changelog", changelog, 10_000);
    }
    if let Some(Some(size)) = patch.size_bytes
        && size < 0
    {
        v.push("size_bytes", "Size", "Size cannot be negative");
    }
}

pub fn validate_warnings(v: &mut Validator, warnings: &[ModuleWarning]) {
    for (idx, warning) in warnings.iter().enumerate() {
        v.length(format!("warnings[{idx}].message"), "Warning", &warning.message, 1, 500);
    }
}

pub fn validate_module_patch(v: &mut Validator, patch: &ModulePatch) {
    if let Some(name) = &patch.name {
        v.length("name", "Name", name, 3, 100);
    }
    if let Some(value) = &patch.short_description {
        v.length("short_description", "Short description", value, 10, 200);
    }
    if let Some(value) = &patch.description {
        v.length("description", "Description", value, 20, 5000);
    }
    if let Some(value) = &patch.author {
        v.length("author", "Author", value, 2, 50);
    }
    if let Some(value) = &patch.category {
        v.one_of("category", "Category", value, MODULE_CATEGORIES);
    }
    if let Some(value) = &patch.license {
        v.length("license", "License", value, 1, 50);
    }
    if let Some(values) = &patch.android_versions {
        v.subset("android_versions", "Android version", values, ANDROID_VERSIONS);
    }
    if let Some(values) = &patch.root_methods {
        v.subset("root_methods", "Root method", values, ROOT_METHODS);
    }
    if let Some(values) = &patch.features {
        validate_features(v, values);
    }
    if let Some(value) = &patch.source_url {
        v.http_url("source_url", "Source URL", value);
    }
    if let Some(Some(value)) = &patch.icon_url {
        v.http_url("icon_url", "Icon URL", value);
    }
    if let Some(warnings) = &patch.warnings {
        validate_warnings(v, warnings);
    }
}

pub fn validate_rating(v: &mut Validator, rating: i32, comment: Option<&str>) {
    if !(1..=5).contains(&rating) {
        v.push("rating", "Rating", "Rating must be between 1 and 5");
    }
    if let Some(comment) = comment {
        v.max_length("comment", "Comment", comment, 1000);
    }
}

pub fn validate_reply(v: &mut Validator, comment: &str) {
    v.length("comment", "Reply", comment, 1, 1000);
}

pub fn validate_api_key_request(
    v: &mut Validator,
    name: &str,
    scopes: &[ApiScope],
    expires_in_days: Option<u32>,
) {
    v.length("name", "Key name", name, 1, 50);
    if scopes.is_empty() {
        v.push("scopes", "Scopes", "Select at least one scope");
    }
    if let Some(days) = expires_in_days
        && !(1..=MAX_EXPIRY_DAYS).contains(&days)
    {
        v.push(
            "expires_in_days",
            "Expiry",
            format!("Expiry must be between 1 and {MAX_EXPIRY_DAYS} days"),
        );
    }
}

pub fn validate_registration(
    v: &mut Validator,
    username: &str,
    email: Option<&str>,
    password: &str,
) {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        v.push("username", "Username", "Username must be between 3 and 32 characters");
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        v.push(
            "username",
            "Username",
            "Username can only contain letters, numbers, hyphens, and underscores",
        );
    }

    if let Some(email) = email
        && !is_plausible_email(email)
    {
        v.push("email", "Email", "Enter a valid email address");
    }

    validate_password(v, "password", password);
}

pub fn validate_password(v: &mut Validator, field: &str, password: &str) {
    if password.chars().count() < 8 {
        v.push(field, "Password", "Password must be at least 8 characters");
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

pub fn validate_decline_reason(v: &mut Validator, reason: &str) {
    v.length("reason", "Reason", reason, 1, 1000);
}

/// Page is 1-based, limit is 1..=100.
pub fn validate_pagination(
    page: Option<usize>,
    limit: Option<usize>,
    default_limit: usize,
) -> Result<(usize, usize), ApiError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(default_limit);

    let mut v = Validator::new();
    if page < 1 {
        v.push("page", "Page", "Page must be at least 1");
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        v.push(
            "limit",
            "Limit",
            format!("Limit must be between 1 and {MAX_PAGE_SIZE}"),
        );
    }
    v.finish()?;

    Ok((page, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WarningKind;

    fn draft() -> ModuleDraft {
        ModuleDraft {
            name: "Busybox NDK".to_string(),
            short_description: "Static busybox for Android".to_string(),
            description: "A complete busybox build installed systemlessly.".to_string(),
            author: "osm0sis".to_string(),
            category: "Utilities".to_string(),
            license: "GPL-2.0".to_string(),
            android_versions: vec!["14".to_string()],
            root_methods: vec!["Magisk".to_string(), "KernelSU".to_string()],
            features: vec!["Applets".to_string()],
            source_url: "https://github.com/osm0sis/busybox".to_string(),
            icon_url: None,
            is_open_source: true,
        }
    }

    fn fields(v: Validator) -> Vec<String> {
        match v.finish() {
            Ok(()) => Vec::new(),
            Err(ApiError::InvalidFields(errors)) => errors.into_iter().map(|e| e.field).collect(),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        let mut v = Validator::new();
        validate_module_draft(&mut v, &draft());
        assert!(v.is_valid());
    }

    #[test]
    fn test_name_length_boundary() {
        let mut short = draft();
        short.name = "ab".to_string();
        let mut v = Validator::new();
        validate_module_draft(&mut v, &short);
        assert_eq!(fields(v), vec!["name"]);

        let mut ok = draft();
        ok.name = "abc".to_string();
        let mut v = Validator::new();
        validate_module_draft(&mut v, &ok);
        assert!(v.is_valid());

        let mut padded = draft();
        padded.name = "  ab  ".to_string();
        let mut v = Validator::new();
        validate_module_draft(&mut v, &padded);
        assert_eq!(fields(v), vec!["name"]);
    }

    #[test]
    fn test_collects_every_failure() {
        let mut bad = draft();
        bad.category = "Games".to_string();
        bad.root_methods = vec!["SuperSU".to_string()];
        bad.android_versions = Vec::new();
        bad.source_url = "ftp://example.com".to_string();

        let mut v = Validator::new();
        validate_module_draft(&mut v, &bad);
        assert_eq!(
            fields(v),
            vec!["category", "android_versions", "root_methods[0]", "source_url"]
        );
    }

    #[test]
    fn test_feature_limits() {
        let mut bad = draft();
        bad.features = vec!["x".to_string(); 21];
        bad.features[3] = String::new();
        let mut v = Validator::new();
        validate_module_draft(&mut v, &bad);
        assert_eq!(fields(v), vec!["features", "features[3]"]);
    }

    #[test]
    fn test_release_rules() {
        let release = |version: &str| NewRelease {
            version: version.to_string(),
            download_url: "https://example.com/m.zip".to_string(),
            changelog: None,
            size_bytes: None,
            github_release_id: None,
        };

        let mut v = Validator::new();
        validate_submitted_releases(&mut v, &[release("v1.0"), release("v 2"), release("v1.0")]);
        assert_eq!(fields(v), vec!["releases[1].version", "releases[2].version"]);

        let too_many: Vec<NewRelease> = (0..21).map(|n| release(&format!("v{n}"))).collect();
        let mut v = Validator::new();
        validate_submitted_releases(&mut v, &too_many);
        assert_eq!(fields(v), vec!["releases"]);
    }

    #[test]
    fn test_warning_message_bounds() {
        let mut v = Validator::new();
        validate_warnings(
            &mut v,
            &[
                ModuleWarning {
                    kind: WarningKind::Caution,
                    message: "Breaks Play Integrity".to_string(),
                },
                ModuleWarning {
                    kind: WarningKind::Info,
                    message: "x".repeat(501),
                },
            ],
        );
        assert_eq!(fields(v), vec!["warnings[1].message"]);
    }

    #[test]
    fn test_rating_and_reply() {
        let mut v = Validator::new();
        validate_rating(&mut v, 0, None);
        validate_rating(&mut v, 6, Some(&"x".repeat(1001)));
        validate_rating(&mut v, 5, Some("great"));
        validate_reply(&mut v, "   ");
        assert_eq!(fields(v), vec!["rating", "rating", "comment", "comment"]);
    }

    #[test]
    fn test_registration() {
        let mut v = Validator::new();
        validate_registration(&mut v, "good_name-1", Some("a@b.c"), "longenough");
        assert!(v.is_valid());

        let mut v = Validator::new();
        validate_registration(&mut v, "bad name", Some("nope"), "short");
        assert_eq!(fields(v), vec!["username", "email", "password"]);
    }

    #[test]
    fn test_api_key_request() {
        let mut v = Validator::new();
        validate_api_key_request(&mut v, "ci", &[ApiScope::Read], Some(30));
        assert!(v.is_valid());

        let mut v = Validator::new();
        validate_api_key_request(&mut v, "", &[], Some(366));
        assert_eq!(fields(v), vec!["name", "scopes", "expires_in_days"]);
    }

    #[test]
    fn test_pagination() {
        assert_eq!(validate_pagination(None, None, 20).unwrap(), (1, 20));
        assert!(validate_pagination(Some(0), None, 20).is_err());
        assert!(validate_pagination(None, Some(101), 20).is_err());
        assert_eq!(validate_pagination(Some(3), Some(100), 20).unwrap(), (3, 100));
    }
}
