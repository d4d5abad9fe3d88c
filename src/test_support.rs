//! Scripted transport for exercising the query layer and aggregator offline.

use crate::github::{GithubClient, RestReply, Transport};
use crate::queries::GraphqlRequest;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const ANY_OPERATION: &str = "*";

#[derive(Default)]
struct Script {
    graphql: HashMap<String, VecDeque<Result<Value>>>,
    graphql_log: Vec<GraphqlRequest>,
    rest: HashMap<String, VecDeque<Result<RestReply>>>,
    rest_defaults: HashMap<String, RestReply>,
    rest_log: Vec<String>,
}

/// Replies are queued per GraphQL operation name or per REST path. An
/// exhausted GraphQL queue answers `{}`; an exhausted REST queue answers the
/// path's default, or `200 []`.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    latency: Option<Duration>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_graphql(&self, reply: Result<Value>) {
        self.push_operation(ANY_OPERATION, reply);
    }

    pub fn push_operation(&self, operation: &str, reply: Result<Value>) {
        self.lock()
            .graphql
            .entry(operation.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn push_rest(&self, path: &str, reply: Result<RestReply>) {
        self.lock()
            .rest
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn set_rest_default(&self, path: &str, reply: RestReply) {
        self.lock().rest_defaults.insert(path.to_string(), reply);
    }

    pub fn graphql_calls(&self) -> usize {
        self.lock().graphql_log.len()
    }

    pub fn operation_requests(&self, operation: &str) -> Vec<GraphqlRequest> {
        self.lock()
            .graphql_log
            .iter()
            .filter(|r| operation_name(&r.query) == operation)
            .cloned()
            .collect()
    }

    pub fn rest_calls(&self, path: &str) -> usize {
        self.lock().rest_log.iter().filter(|p| *p == path).count()
    }

    pub fn total_rest_calls(&self) -> usize {
        self.lock().rest_log.len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// `query Overview(...)` -> `Overview`.
fn operation_name(query: &str) -> &str {
    query
        .trim_start()
        .strip_prefix("query ")
        .and_then(|rest| rest.split(|c: char| c == '(' || c == '{' || c.is_whitespace()).next())
        .unwrap_or("")
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_graphql(&self, request: &GraphqlRequest) -> Result<Value> {
        self.enter().await;
        let reply = {
            let mut script = self.lock();
            script.graphql_log.push(request.clone());
            let op = operation_name(&request.query).to_string();
            let specific = script.graphql.get_mut(&op).and_then(VecDeque::pop_front);
            match specific {
                Some(reply) => reply,
                None => script
                    .graphql
                    .get_mut(ANY_OPERATION)
                    .and_then(VecDeque::pop_front)
                    .unwrap_or_else(|| Ok(json!({}))),
            }
        };
        self.leave();
        reply
    }

    async fn get_rest(&self, path: &str, _params: &[(String, String)]) -> Result<RestReply> {
        self.enter().await;
        let reply = {
            let mut script = self.lock();
            script.rest_log.push(path.to_string());
            match script.rest.get_mut(path).and_then(VecDeque::pop_front) {
                Some(reply) => reply,
                None => Ok(script.rest_defaults.get(path).cloned().unwrap_or(RestReply {
                    status: 200,
                    body: json!([]),
                })),
            }
        };
        self.leave();
        reply
    }
}

pub fn client_with(
    primary: &ScriptedTransport,
    fallback: &ScriptedTransport,
    max_connections: usize,
) -> GithubClient {
    GithubClient::with_transports(
        "octocat",
        Arc::new(primary.clone()),
        Arc::new(fallback.clone()),
        max_connections,
    )
}

/// A repo node as returned inside a repo connection.
pub fn repo(name: &str, stars: u64, forks: u64, languages: &[(&str, u64, Option<&str>)]) -> Value {
    let edges: Vec<Value> = languages
        .iter()
        .map(|(lang, size, color)| json!({"size": size, "node": {"name": lang, "color": color}}))
        .collect();
    json!({
        "nameWithOwner": name,
        "stargazers": {"totalCount": stars},
        "forkCount": forks,
        "languages": {"edges": edges}
    })
}

/// One overview page with the given owned and contributed-to connections,
/// each as `(nodes, has_next_page, end_cursor)`.
pub fn overview_page(
    owned: (Vec<Value>, bool, Option<&str>),
    contributed: (Vec<Value>, bool, Option<&str>),
) -> Value {
    json!({
        "data": {"viewer": {
            "login": "octocat",
            "name": "The Octocat",
            "createdAt": "2011-01-25T18:44:36Z",
            "followers": {"totalCount": 42},
            "following": {"totalCount": 7},
            "sponsoring": {"totalCount": 1},
            "starredRepositories": {"totalCount": 99},
            "repositories": {
                "pageInfo": {"hasNextPage": owned.1, "endCursor": owned.2},
                "nodes": owned.0
            },
            "repositoriesContributedTo": {
                "pageInfo": {"hasNextPage": contributed.1, "endCursor": contributed.2},
                "nodes": contributed.0
            }
        }}
    })
}
