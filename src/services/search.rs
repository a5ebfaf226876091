//! In-memory module search: filter, sort, paginate.
//!
//! Runs over the list of published module summaries. Every active predicate
//! must hold for a module to be returned, and ordering is fully deterministic:
//! ties on the sort key fall back to name (case-insensitive) then id, both ascending.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::constants::limits::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain::SortOrder;
use crate::models::module::ModuleSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    Rating,
    Downloads,
    #[default]
    Updated,
}

/// Active predicates. `None`/`false` means the predicate is off.
#[derive(Debug, Clone, Default)]
pub struct ModuleFilter {
    pub query: Option<String>,
    pub category: Option<String>,
    pub root_method: Option<String>,
    pub android_version: Option<String>,
    pub min_rating: Option<f64>,
    pub max_size_bytes: Option<i64>,
    pub featured: bool,
    pub recommended: bool,
    pub open_source: bool,
    pub hide_warnings: bool,
}

impl ModuleFilter {
    #[must_use]
    pub fn matches(&self, module: &ModuleSummary) -> bool {
        if let Some(q) = self.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            let hit = module.name.to_lowercase().contains(&q)
                || module.short_description.to_lowercase().contains(&q)
                || module.author.to_lowercase().contains(&q);
            if !hit {
                return false;
            }
        }

        if let Some(category) = &self.category
            && !module.category.eq_ignore_ascii_case(category)
        {
            return false;
        }

        if let Some(method) = &self.root_method
            && !module.root_methods.iter().any(|m| m.eq_ignore_ascii_case(method))
        {
            return false;
        }

        if let Some(version) = &self.android_version
            && !module
                .android_versions
                .iter()
                .any(|v| v.eq_ignore_ascii_case(version))
        {
            return false;
        }

        if let Some(min) = self.min_rating
            && module.rating < min
        {
            return false;
        }

        if let Some(max) = self.max_size_bytes {
            match module.latest_size_bytes {
                Some(size) if size <= max => {}
                _ => return false,
            }
        }

        if self.featured && !module.is_featured {
            return false;
        }
        if self.recommended && !module.is_recommended {
            return false;
        }
        if self.open_source && !module.is_open_source {
            return false;
        }
        if self.hide_warnings && !module.warnings.is_empty() {
            return false;
        }

        true
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub filter: ModuleFilter,
    pub sort: SortKey,
    pub order: SortOrder,
    pub page: usize,
    pub limit: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            filter: ModuleFilter::default(),
            sort: SortKey::default(),
            order: SortOrder::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

fn compare_key(a: &ModuleSummary, b: &ModuleSummary, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Rating => a.rating.total_cmp(&b.rating),
        SortKey::Downloads => a.downloads.cmp(&b.downloads),
        SortKey::Updated => a.last_updated.cmp(&b.last_updated),
    }
}

fn tie_break(a: &ModuleSummary, b: &ModuleSummary) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorts in place. The direction applies to the key only.
pub fn sort_modules(modules: &mut [ModuleSummary], key: SortKey, order: SortOrder) {
    modules.sort_by(|a, b| {
        let primary = compare_key(a, b, key);
        let primary = if order.is_ascending() {
            primary
        } else {
            primary.reverse()
        };
        primary.then_with(|| tie_break(a, b))
    });
}

/// Filters, sorts and slices one page. Out-of-range `page`/`limit` are clamped.
#[must_use]
pub fn search(modules: Vec<ModuleSummary>, query: &SearchQuery) -> SearchPage<ModuleSummary> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let page = query.page.max(1);

    let mut matched: Vec<ModuleSummary> = modules
        .into_iter()
        .filter(|m| query.filter.matches(m))
        .collect();

    sort_modules(&mut matched, query.sort, query.order);

    let total = matched.len();
    let total_pages = total.div_ceil(limit);
    let start = (page - 1).saturating_mul(limit);

    let items = if start >= total {
        Vec::new()
    } else {
        matched.into_iter().skip(start).take(limit).collect()
    };

    SearchPage {
        items,
        total,
        page,
        limit,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModuleId, ModuleStatus, ModuleWarning, WarningKind};

    #[allow(clippy::too_many_arguments)]
    fn summary(
        id: i32,
        name: &str,
        category: &str,
        rating: f64,
        downloads: i64,
        size: Option<i64>,
        methods: &[&str],
        updated: &str,
    ) -> ModuleSummary {
        ModuleSummary {
            id: ModuleId::new(id),
            slug: name.to_lowercase(),
            name: name.to_string(),
            short_description: format!("{name} short description"),
            author: "someone".to_string(),
            category: category.to_string(),
            android_versions: vec!["13".to_string(), "14".to_string()],
            root_methods: methods.iter().map(|s| (*s).to_string()).collect(),
            icon_url: None,
            is_open_source: id % 2 == 0,
            is_featured: id % 3 == 0,
            is_recommended: false,
            is_published: true,
            status: ModuleStatus::Approved,
            warnings: Vec::new(),
            downloads,
            rating,
            review_count: 1,
            latest_version: Some("1.0".to_string()),
            latest_size_bytes: size,
            last_updated: updated.to_string(),
        }
    }

    fn fixture() -> Vec<ModuleSummary> {
        let mut with_warning = summary(
            6,
            "Risky Tweaks",
            "Performance",
            3.0,
            40,
            Some(5_000),
            &["Magisk"],
            "2025-03-06T00:00:00+00:00",
        );
        with_warning.warnings.push(ModuleWarning {
            kind: WarningKind::Danger,
            message: "May bootloop".to_string(),
        });

        vec![
            summary(
                1,
                "Busybox",
                "Utilities",
                4.5,
                900,
                Some(2_000_000),
                &["Magisk", "KernelSU"],
                "2025-03-01T00:00:00+00:00",
            ),
            summary(
                2,
                "ViPER4Android",
                "Audio",
                4.8,
                5000,
                Some(12_000_000),
                &["Magisk"],
                "2025-03-02T00:00:00+00:00",
            ),
            summary(
                3,
                "busybox",
                "Utilities",
                4.5,
                100,
                None,
                &["APatch"],
                "2025-03-03T00:00:00+00:00",
            ),
            summary(
                4,
                "Font Manager",
                "Fonts",
                0.0,
                0,
                Some(300_000),
                &["KernelSU-Next"],
                "2025-03-04T00:00:00+00:00",
            ),
            summary(
                5,
                "Battery Saver",
                "Battery",
                2.5,
                250,
                Some(50_000),
                &["magisk"],
                "2025-03-05T00:00:00+00:00",
            ),
            with_warning,
        ]
    }

    fn ids(page: &SearchPage<ModuleSummary>) -> Vec<i32> {
        page.items.iter().map(|m| m.id.value()).collect()
    }

    #[test]
    fn test_default_sort_is_most_recently_updated() {
        let page = search(fixture(), &SearchQuery::default());
        assert_eq!(ids(&page), vec![6, 5, 4, 3, 2, 1]);
        assert_eq!(page.total, 6);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_query_is_case_insensitive_over_name_description_author() {
        let query = SearchQuery {
            filter: ModuleFilter {
                query: Some("BUSY".to_string()),
                ..ModuleFilter::default()
            },
            ..SearchQuery::default()
        };
        let page = search(fixture(), &query);
        assert_eq!(ids(&page).len(), 2);

        let by_author = SearchQuery {
            filter: ModuleFilter {
                query: Some("SomeOne".to_string()),
                ..ModuleFilter::default()
            },
            ..SearchQuery::default()
        };
        assert_eq!(search(fixture(), &by_author).total, 6);
    }

    #[test]
    fn test_every_result_satisfies_every_active_predicate() {
        let filters = vec![
            ModuleFilter {
                root_method: Some("Magisk".to_string()),
                min_rating: Some(3.0),
                ..ModuleFilter::default()
            },
            ModuleFilter {
                max_size_bytes: Some(1_000_000),
                hide_warnings: true,
                ..ModuleFilter::default()
            },
            ModuleFilter {
                category: Some("utilities".to_string()),
                open_source: true,
                ..ModuleFilter::default()
            },
            ModuleFilter {
                featured: true,
                android_version: Some("14".to_string()),
                ..ModuleFilter::default()
            },
        ];

        for filter in filters {
            let query = SearchQuery {
                filter: filter.clone(),
                ..SearchQuery::default()
            };
            let page = search(fixture(), &query);
            let expected = fixture().iter().filter(|m| filter.matches(m)).count();
            assert_eq!(page.total, expected);
            for module in &page.items {
                assert!(filter.matches(module), "{} leaked through", module.name);
            }
        }
    }

    #[test]
    fn test_root_method_membership_ignores_case() {
        let query = SearchQuery {
            filter: ModuleFilter {
                root_method: Some("MAGISK".to_string()),
                ..ModuleFilter::default()
            },
            ..SearchQuery::default()
        };
        let mut found = ids(&search(fixture(), &query));
        found.sort_unstable();
        assert_eq!(found, vec![1, 2, 5, 6]);
    }

    #[test]
    fn test_max_size_requires_known_size() {
        let query = SearchQuery {
            filter: ModuleFilter {
                max_size_bytes: Some(i64::MAX),
                ..ModuleFilter::default()
            },
            ..SearchQuery::default()
        };
        let found = ids(&search(fixture(), &query));
        assert!(!found.contains(&3));
        assert_eq!(found.len(), 5);
    }

    #[test]
    fn test_ties_break_by_name_then_id() {
        let query = SearchQuery {
            sort: SortKey::Rating,
            order: SortOrder::Desc,
            ..SearchQuery::default()
        };
        let page = search(fixture(), &query);
        // 1 "Busybox" and 3 "busybox" share 4.5 and the same lowercase name.
        assert_eq!(ids(&page), vec![2, 1, 3, 6, 5, 4]);
    }

    #[test]
    fn test_name_sort_ascending() {
        let query = SearchQuery {
            sort: SortKey::Name,
            order: SortOrder::Asc,
            ..SearchQuery::default()
        };
        let page = search(fixture(), &query);
        assert_eq!(ids(&page), vec![5, 1, 3, 4, 6, 2]);
    }

    #[test]
    fn test_pagination() {
        let query = SearchQuery {
            sort: SortKey::Downloads,
            order: SortOrder::Desc,
            page: 2,
            limit: 4,
            ..SearchQuery::default()
        };
        let page = search(fixture(), &query);
        assert_eq!(page.total, 6);
        assert_eq!(page.total_pages, 2);
        assert_eq!(ids(&page), vec![6, 4]);

        let past_end = SearchQuery {
            page: 3,
            limit: 4,
            ..SearchQuery::default()
        };
        let page = search(fixture(), &past_end);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 6);
    }

    #[test]
    fn test_limit_is_clamped() {
        let query = SearchQuery {
            limit: 0,
            ..SearchQuery::default()
        };
        let page = search(fixture(), &query);
        assert_eq!(page.limit, 1);
        assert_eq!(page.total_pages, 6);
    }
}
