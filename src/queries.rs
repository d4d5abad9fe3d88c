//! GraphQL documents and the typed shapes of the API responses.
//!
//! Documents are fixed and parameterized; cursors, the privacy filter and the
//! per-year date ranges travel as GraphQL variables instead of being spliced
//! into the query text. Response types are decoded leniently: missing fields
//! take their defaults and malformed list elements are dropped, so a single
//! bad node never poisons a whole page.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// A GraphQL request body: `{"query": ..., "variables": {...}}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GraphqlRequest {
    pub query: String,
    pub variables: Map<String, Value>,
}

const REPO_FIELDS: &str = r#"
                pageInfo {
                    hasNextPage
                    endCursor
                }
                nodes {
                    nameWithOwner
                    stargazers {
                        totalCount
                    }
                    forkCount
                    languages(first: 10, orderBy: {field: SIZE, direction: DESC}) {
                        edges {
                            size
                            node {
                                name
                                color
                            }
                        }
                    }
                }"#;

/// Profile scalars plus one page of each repo connection.
///
/// `privacy` is `PUBLIC` when private repos are excluded and `null` otherwise,
/// which GitHub treats as "no filter".
pub fn overview(
    owned_cursor: Option<&str>,
    contrib_cursor: Option<&str>,
    exclude_private_repos: bool,
) -> GraphqlRequest {
    let query = format!(
        r#"query Overview($ownedCursor: String, $contribCursor: String, $privacy: RepositoryPrivacy) {{
    viewer {{
        login
        name
        createdAt
        followers {{ totalCount }}
        following {{ totalCount }}
        sponsoring {{ totalCount }}
        starredRepositories {{ totalCount }}
        repositories(
            first: 100,
            privacy: $privacy,
            orderBy: {{field: UPDATED_AT, direction: DESC}},
            isFork: false,
            ownerAffiliations: [OWNER, ORGANIZATION_MEMBER],
            after: $ownedCursor
        ) {{{REPO_FIELDS}
        }}
        repositoriesContributedTo(
            first: 100,
            includeUserRepositories: false,
            orderBy: {{field: UPDATED_AT, direction: DESC}},
            contributionTypes: [COMMIT, PULL_REQUEST, REPOSITORY, PULL_REQUEST_REVIEW],
            after: $contribCursor
        ) {{{REPO_FIELDS}
        }}
    }}
}}"#
    );

    let mut variables = Map::new();
    variables.insert("ownedCursor".into(), json!(owned_cursor));
    variables.insert("contribCursor".into(), json!(contrib_cursor));
    variables.insert(
        "privacy".into(),
        if exclude_private_repos {
            json!("PUBLIC")
        } else {
            Value::Null
        },
    );

    GraphqlRequest { query, variables }
}

pub fn contrib_years() -> GraphqlRequest {
    GraphqlRequest {
        query: "query ContributionYears {\n    viewer {\n        contributionsCollection {\n            contributionYears\n        }\n    }\n}".to_string(),
        variables: Map::new(),
    }
}

/// One aliased `contributionsCollection` per year, fetched in a single round trip.
///
/// Aliases are built from integer years only; the date bounds are variables.
pub fn all_contribs(years: &[i32]) -> GraphqlRequest {
    let mut params = Vec::with_capacity(years.len() * 2);
    let mut selections = String::new();
    let mut variables = Map::new();

    for year in years {
        params.push(format!("$from{year}: DateTime!, $to{year}: DateTime!"));
        selections.push_str(&format!(
            "        year{year}: contributionsCollection(from: $from{year}, to: $to{year}) {{\n            contributionCalendar {{ totalContributions }}\n        }}\n"
        ));
        variables.insert(format!("from{year}"), json!(format!("{year}-01-01T00:00:00Z")));
        variables.insert(
            format!("to{year}"),
            json!(format!("{}-01-01T00:00:00Z", year + 1)),
        );
    }

    GraphqlRequest {
        query: format!(
            "query AllContributions({}) {{\n    viewer {{\n{selections}    }}\n}}",
            params.join(", ")
        ),
        variables,
    }
}

/// Decode a list, silently dropping null or malformed elements.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect())
}

/// Decode a map, silently dropping entries whose value is null or malformed.
fn lenient_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .filter_map(|(k, v)| serde_json::from_value(v).ok().map(|t| (k, t)))
        .collect())
}

/// Decode a value, falling back to the default for null or malformed input.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct Envelope<T> {
    #[serde(default, deserialize_with = "or_default")]
    pub data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverviewData {
    #[serde(default, deserialize_with = "or_default")]
    pub viewer: Option<Viewer>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Count {
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "or_default")]
    pub followers: Count,
    #[serde(default, deserialize_with = "or_default")]
    pub following: Count,
    #[serde(default, deserialize_with = "or_default")]
    pub sponsoring: Count,
    #[serde(default, deserialize_with = "or_default")]
    pub starred_repositories: Count,
    #[serde(default, deserialize_with = "or_default")]
    pub repositories: Connection,
    #[serde(default, deserialize_with = "or_default")]
    pub repositories_contributed_to: Connection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default, deserialize_with = "or_default")]
    pub page_info: PageInfo,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub nodes: Vec<RepoNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoNode {
    pub name_with_owner: String,
    #[serde(default, deserialize_with = "or_default")]
    pub stargazers: Count,
    #[serde(default)]
    pub fork_count: u64,
    #[serde(default, deserialize_with = "or_default")]
    pub languages: LanguageEdges,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageEdges {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub edges: Vec<LanguageEdge>,
}

#[derive(Debug, Deserialize)]
pub struct LanguageEdge {
    #[serde(default)]
    pub size: u64,
    #[serde(default, deserialize_with = "or_default")]
    pub node: LanguageNode,
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContribYearsData {
    #[serde(default, deserialize_with = "or_default")]
    pub viewer: Option<ContribYearsViewer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContribYearsViewer {
    #[serde(default, deserialize_with = "or_default")]
    pub contributions_collection: ContributionYears,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionYears {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub contribution_years: Vec<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AllContribsData {
    /// Keyed by alias (`year2021`, ...).
    #[serde(default, deserialize_with = "lenient_map")]
    pub viewer: BTreeMap<String, YearContributions>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearContributions {
    #[serde(default, deserialize_with = "or_default")]
    pub contribution_calendar: Calendar,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    #[serde(default)]
    pub total_contributions: u64,
}

/// One entry of `/repos/{owner}/{repo}/stats/contributors`.
#[derive(Debug, Deserialize)]
pub struct Contributor {
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub weeks: Vec<ContributorWeek>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContributorWeek {
    #[serde(default)]
    pub a: u64,
    #[serde(default)]
    pub d: u64,
}

/// Decode a contributors payload. Anything but a list yields no contributors.
pub fn parse_contributors(body: Value) -> Vec<Contributor> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode a GraphQL envelope; an undecodable body is treated as empty.
pub fn parse_envelope<T: DeserializeOwned>(body: Value) -> Option<T> {
    serde_json::from_value::<Envelope<T>>(body)
        .ok()
        .and_then(|e| e.data)
}
