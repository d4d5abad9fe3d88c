//! Lazily fetched, memoized GitHub statistics.
//!
//! Fields are grouped by the request that produces them: the paginated
//! overview traversal (profile scalars, repos, stars, forks, languages), the
//! contribution-year fan-out, and the per-repo lines-changed scan. Each group
//! sits behind a `OnceCell`, so the first accessor to need a group runs its
//! computation, concurrent callers wait on that same run, and later calls
//! read the cached value.

use crate::age;
use crate::config::Filters;
use crate::github::GithubClient;
use crate::queries::{self, AllContribsData, ContribYearsData, OverviewData, RepoNode, Viewer};
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tokio::sync::OnceCell;

const NO_NAME: &str = "No Name";
const OTHER_LANGUAGE: &str = "Other";

#[derive(Debug, Clone, PartialEq)]
pub struct Language {
    pub size: u64,
    pub occurrences: u64,
    pub color: Option<String>,
    /// Percentage of the total size across all languages.
    pub proportion: f64,
}

/// Everything produced by the overview traversal, filled as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub name: String,
    pub joined: String,
    pub followers: u64,
    pub following: u64,
    pub sponsoring: u64,
    pub starred_repos: u64,
    pub stargazers: u64,
    pub forks: u64,
    pub languages: BTreeMap<String, Language>,
    pub repos: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinesChanged {
    pub additions: u64,
    pub deletions: u64,
}

impl LinesChanged {
    pub fn total(&self) -> u64 {
        self.additions.saturating_add(self.deletions)
    }
}

/// Running totals for the overview traversal.
///
/// Pages are merged strictly in the order they arrive; `finish` computes the
/// language proportions once every size is known.
struct Traversal<'a> {
    filters: &'a Filters,
    excluded_langs: HashSet<String>,
    name: Option<String>,
    joined: Option<String>,
    followers: u64,
    following: u64,
    sponsoring: u64,
    starred_repos: u64,
    stargazers: u64,
    forks: u64,
    languages: BTreeMap<String, Language>,
    repos: BTreeSet<String>,
}

impl<'a> Traversal<'a> {
    fn new(filters: &'a Filters) -> Self {
        Self {
            filters,
            excluded_langs: filters
                .exclude_langs
                .iter()
                .map(|l| l.to_lowercase())
                .collect(),
            name: None,
            joined: None,
            followers: 0,
            following: 0,
            sponsoring: 0,
            starred_repos: 0,
            stargazers: 0,
            forks: 0,
            languages: BTreeMap::new(),
            repos: BTreeSet::new(),
        }
    }

    /// Profile scalars are the same on every page; a page without a viewer
    /// (failed request) leaves them untouched.
    fn merge_profile(&mut self, viewer: &Viewer) {
        self.name = viewer
            .name
            .clone()
            .or_else(|| viewer.login.clone())
            .or_else(|| self.name.take());
        if let Some(created_at) = viewer.created_at {
            self.joined = Some(age::joined_ago(created_at, Utc::now()));
        }
        self.followers = viewer.followers.total_count;
        self.following = viewer.following.total_count;
        self.sponsoring = viewer.sponsoring.total_count;
        self.starred_repos = viewer.starred_repositories.total_count;
    }

    /// First occurrence of a repo wins; excluded repos are never counted.
    fn merge_repo(&mut self, repo: &RepoNode) {
        let name = &repo.name_with_owner;
        if self.repos.contains(name) || self.filters.exclude_repos.contains(name) {
            return;
        }
        self.repos.insert(name.clone());
        self.stargazers += repo.stargazers.total_count;
        self.forks += repo.fork_count;

        for edge in &repo.languages.edges {
            let lang = edge.node.name.as_deref().unwrap_or(OTHER_LANGUAGE);
            if self.excluded_langs.contains(&lang.to_lowercase()) {
                continue;
            }
            match self.languages.get_mut(lang) {
                Some(entry) => {
                    entry.size += edge.size;
                    entry.occurrences += 1;
                }
                None => {
                    self.languages.insert(
                        lang.to_string(),
                        Language {
                            size: edge.size,
                            occurrences: 1,
                            color: edge.node.color.clone(),
                            proportion: 0.0,
                        },
                    );
                }
            }
        }
    }

    fn finish(mut self) -> Overview {
        let total: u64 = self.languages.values().map(|l| l.size).sum();
        for lang in self.languages.values_mut() {
            lang.proportion = if total == 0 {
                0.0
            } else {
                100.0 * lang.size as f64 / total as f64
            };
        }

        Overview {
            name: self.name.unwrap_or_else(|| NO_NAME.to_string()),
            joined: self.joined.unwrap_or_else(|| age::UNKNOWN.to_string()),
            followers: self.followers,
            following: self.following,
            sponsoring: self.sponsoring,
            starred_repos: self.starred_repos,
            stargazers: self.stargazers,
            forks: self.forks,
            languages: self.languages,
            repos: self.repos,
        }
    }
}

/// The statistics aggregator. Share it by reference between consumers.
pub struct Stats {
    client: GithubClient,
    filters: Filters,
    overview: OnceCell<Overview>,
    total_contributions: OnceCell<u64>,
    lines_changed: OnceCell<LinesChanged>,
}

impl Stats {
    pub fn new(client: GithubClient, filters: Filters) -> Self {
        Self {
            client,
            filters,
            overview: OnceCell::new(),
            total_contributions: OnceCell::new(),
            lines_changed: OnceCell::new(),
        }
    }

    pub fn username(&self) -> &str {
        self.client.username()
    }

    /// Run (or join) the overview traversal and return its result.
    pub async fn overview(&self) -> &Overview {
        self.overview.get_or_init(|| self.fetch_overview()).await
    }

    #[tracing::instrument(skip(self), fields(user = %self.client.username()))]
    async fn fetch_overview(&self) -> Overview {
        let mut traversal = Traversal::new(&self.filters);
        let mut owned_cursor: Option<String> = None;
        let mut contrib_cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let request = queries::overview(
                owned_cursor.as_deref(),
                contrib_cursor.as_deref(),
                self.filters.exclude_private_repos,
            );
            let raw = self.client.query(&request).await;
            pages += 1;

            let Some(viewer) = queries::parse_envelope::<OverviewData>(raw).and_then(|d| d.viewer)
            else {
                tracing::warn!(page = pages, "Overview page returned no data");
                break;
            };

            traversal.merge_profile(&viewer);

            let owned = &viewer.repositories;
            let contributed = &viewer.repositories_contributed_to;
            for repo in &owned.nodes {
                traversal.merge_repo(repo);
            }
            if !self.filters.exclude_forked_repos {
                for repo in &contributed.nodes {
                    traversal.merge_repo(repo);
                }
            }
            tracing::debug!(page = pages, repos = traversal.repos.len(), "Merged overview page");

            if !(owned.page_info.has_next_page || contributed.page_info.has_next_page) {
                break;
            }

            let next_owned = owned.page_info.end_cursor.clone().or(owned_cursor.clone());
            let next_contrib = contributed
                .page_info
                .end_cursor
                .clone()
                .or(contrib_cursor.clone());
            if next_owned == owned_cursor && next_contrib == contrib_cursor {
                tracing::warn!(page = pages, "Pagination cursors did not advance, stopping");
                break;
            }
            owned_cursor = next_owned;
            contrib_cursor = next_contrib;
        }

        let overview = traversal.finish();
        tracing::info!(
            pages,
            repos = overview.repos.len(),
            languages = overview.languages.len(),
            "Collected repository overview"
        );
        overview
    }

    pub async fn name(&self) -> &str {
        &self.overview().await.name
    }

    /// Relative join date, e.g. "5 years ago".
    pub async fn joined(&self) -> &str {
        &self.overview().await.joined
    }

    pub async fn followers(&self) -> u64 {
        self.overview().await.followers
    }

    pub async fn following(&self) -> u64 {
        self.overview().await.following
    }

    pub async fn sponsoring(&self) -> u64 {
        self.overview().await.sponsoring
    }

    pub async fn starred_repos(&self) -> u64 {
        self.overview().await.starred_repos
    }

    /// Total stars across the counted repos.
    pub async fn stargazers(&self) -> u64 {
        self.overview().await.stargazers
    }

    pub async fn forks(&self) -> u64 {
        self.overview().await.forks
    }

    pub async fn languages(&self) -> &BTreeMap<String, Language> {
        &self.overview().await.languages
    }

    pub async fn language_proportions(&self) -> BTreeMap<String, f64> {
        self.languages()
            .await
            .iter()
            .map(|(name, lang)| (name.clone(), lang.proportion))
            .collect()
    }

    /// `owner/name` of every counted repo.
    pub async fn repos(&self) -> &BTreeSet<String> {
        &self.overview().await.repos
    }

    pub async fn total_contributions(&self) -> u64 {
        *self
            .total_contributions
            .get_or_init(|| self.fetch_total_contributions())
            .await
    }

    async fn fetch_total_contributions(&self) -> u64 {
        let years = queries::parse_envelope::<ContribYearsData>(
            self.client.query(&queries::contrib_years()).await,
        )
        .and_then(|d| d.viewer)
        .map(|v| v.contributions_collection.contribution_years)
        .unwrap_or_default();

        if years.is_empty() {
            tracing::info!("No contribution years found");
            return 0;
        }

        let total = queries::parse_envelope::<AllContribsData>(
            self.client.query(&queries::all_contribs(&years)).await,
        )
        .map(|d| {
            d.viewer
                .values()
                .map(|y| y.contribution_calendar.total_contributions)
                .sum::<u64>()
        })
        .unwrap_or(0);

        tracing::info!(years = years.len(), total, "Collected contributions");
        total
    }

    pub async fn lines_changed(&self) -> LinesChanged {
        *self
            .lines_changed
            .get_or_init(|| self.fetch_lines_changed())
            .await
    }

    async fn fetch_lines_changed(&self) -> LinesChanged {
        let repos = self.repos().await;
        let per_repo = join_all(repos.iter().map(|repo| self.repo_lines_changed(repo))).await;

        let total = per_repo
            .into_iter()
            .fold(LinesChanged::default(), |acc, lines| LinesChanged {
                additions: acc.additions.saturating_add(lines.additions),
                deletions: acc.deletions.saturating_add(lines.deletions),
            });
        tracing::info!(
            additions = total.additions,
            deletions = total.deletions,
            "Collected lines changed"
        );
        total
    }

    async fn repo_lines_changed(&self, repo: &str) -> LinesChanged {
        let body = self
            .client
            .query_rest(&format!("/repos/{repo}/stats/contributors"), &[])
            .await;

        let mut lines = LinesChanged::default();
        for contributor in queries::parse_contributors(body) {
            let is_user = contributor
                .author
                .as_ref()
                .is_some_and(|a| a.login == self.client.username());
            if !is_user {
                continue;
            }
            for week in &contributor.weeks {
                lines.additions = lines.additions.saturating_add(week.a);
                lines.deletions = lines.deletions.saturating_add(week.d);
            }
        }
        lines
    }
}
