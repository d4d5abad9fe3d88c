use crate::queries::GraphqlRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::sleep;

const GRAPHQL_URL: &str = "https://api.github.com/graphql";
const REST_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "github-stats";

/// GitHub answers 202 while contributor statistics are still being computed.
const STATUS_ACCEPTED: u16 = 202;
const REST_MAX_ATTEMPTS: usize = 60;
const REST_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Raw REST response: status code plus decoded JSON body (`Null` if undecodable).
#[derive(Debug, Clone)]
pub struct RestReply {
    pub status: u16,
    pub body: Value,
}

/// One way of reaching the GitHub API.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_graphql(&self, request: &GraphqlRequest) -> Result<Value>;
    async fn get_rest(&self, path: &str, params: &[(String, String)]) -> Result<RestReply>;
}

/// Primary transport: shared async reqwest client.
pub struct HttpTransport {
    token: Arc<String>,
    http: Client,
}

impl HttpTransport {
    pub fn new(token: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            token: Arc::new(token.to_string()),
            http,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_graphql(&self, request: &GraphqlRequest) -> Result<Value> {
        let resp = self
            .http
            .post(GRAPHQL_URL)
            .bearer_auth(&*self.token)
            .json(request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Network error sending GraphQL request: {e}"))?;

        resp.json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse JSON from GitHub: {e}"))
    }

    async fn get_rest(&self, path: &str, params: &[(String, String)]) -> Result<RestReply> {
        let resp = self
            .http
            .get(rest_url(path))
            .bearer_auth(&*self.token)
            .query(params)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Network error sending REST request: {e}"))?;

        let status = resp.status().as_u16();
        let body = resp.json().await.unwrap_or(Value::Null);
        Ok(RestReply { status, body })
    }
}

/// Fallback transport: a fresh `reqwest::blocking` client per call, run on the
/// blocking pool so it never stalls the async workers.
pub struct BlockingTransport {
    token: Arc<String>,
}

impl BlockingTransport {
    pub fn new(token: &str) -> Self {
        Self {
            token: Arc::new(token.to_string()),
        }
    }
}

#[async_trait]
impl Transport for BlockingTransport {
    async fn post_graphql(&self, request: &GraphqlRequest) -> Result<Value> {
        let token = Arc::clone(&self.token);
        let request = request.clone();
        tokio::task::spawn_blocking(move || -> Result<Value> {
            let client = reqwest::blocking::Client::builder()
                .user_agent(USER_AGENT)
                .build()?;
            let resp = client
                .post(GRAPHQL_URL)
                .bearer_auth(&*token)
                .json(&request)
                .send()
                .context("Blocking GraphQL request failed")?;
            resp.json().context("Blocking GraphQL response was not JSON")
        })
        .await
        .context("Blocking GraphQL task panicked")?
    }

    async fn get_rest(&self, path: &str, params: &[(String, String)]) -> Result<RestReply> {
        let token = Arc::clone(&self.token);
        let url = rest_url(path);
        let params = params.to_vec();
        tokio::task::spawn_blocking(move || -> Result<RestReply> {
            let client = reqwest::blocking::Client::builder()
                .user_agent(USER_AGENT)
                .build()?;
            let resp = client
                .get(url)
                .bearer_auth(&*token)
                .query(&params)
                .send()
                .context("Blocking REST request failed")?;
            let status = resp.status().as_u16();
            let body = resp.json().unwrap_or(Value::Null);
            Ok(RestReply { status, body })
        })
        .await
        .context("Blocking REST task panicked")?
    }
}

fn rest_url(path: &str) -> String {
    format!("{REST_BASE}/{}", path.trim_start_matches('/'))
}

/// Query layer: the only component that talks to the network.
///
/// Every call takes a permit from a shared semaphore first, so the accessor
/// fan-out in the aggregator never has more than `max_connections` requests
/// in flight. Failures are absorbed here: callers always get a JSON value,
/// possibly an empty object.
#[derive(Clone)]
pub struct GithubClient {
    username: Arc<String>,
    primary: Arc<dyn Transport>,
    fallback: Arc<dyn Transport>,
    semaphore: Arc<Semaphore>,
    retry_delay: Duration,
}

impl GithubClient {
    pub fn new(username: &str, token: &str, max_connections: usize) -> Result<Self> {
        Ok(Self::with_transports(
            username,
            Arc::new(HttpTransport::new(token)?),
            Arc::new(BlockingTransport::new(token)),
            max_connections,
        ))
    }

    pub fn with_transports(
        username: &str,
        primary: Arc<dyn Transport>,
        fallback: Arc<dyn Transport>,
        max_connections: usize,
    ) -> Self {
        Self {
            username: Arc::new(username.to_string()),
            primary,
            fallback,
            semaphore: Arc::new(Semaphore::new(max_connections.max(1))),
            retry_delay: REST_RETRY_DELAY,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Post a GraphQL document. Never fails: a transport error triggers one
    /// attempt through the fallback client, and if that yields nothing usable
    /// the result is an empty object.
    pub async fn query(&self, request: &GraphqlRequest) -> Value {
        let primary = {
            let _permit = self.semaphore.acquire().await;
            self.primary.post_graphql(request).await
        };

        let result = match primary {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!("GraphQL request failed, retrying with fallback client: {e:#}");
                let _permit = self.semaphore.acquire().await;
                match self.fallback.post_graphql(request).await {
                    Ok(json) => Some(json),
                    Err(e) => {
                        tracing::warn!("Fallback GraphQL request failed: {e:#}");
                        None
                    }
                }
            }
        };

        match result {
            Some(json) if !json.is_null() => {
                if let Some(errors) = json.get("errors") {
                    tracing::warn!("GraphQL reported errors: {errors}");
                }
                json
            }
            _ => Value::Object(Map::new()),
        }
    }

    /// GET a REST path, waiting out "202 Accepted" placeholders.
    ///
    /// Only 202 is retried, up to 60 times with a fixed delay. Any other
    /// status is final: its JSON body is returned, or an empty object when
    /// there is none (204 for an empty repo, say).
    pub async fn query_rest(&self, path: &str, params: &[(String, String)]) -> Value {
        for attempt in 1..=REST_MAX_ATTEMPTS {
            let primary = {
                let _permit = self.semaphore.acquire().await;
                self.primary.get_rest(path, params).await
            };

            let reply = match primary {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(path, "REST request failed, retrying with fallback client: {e:#}");
                    let _permit = self.semaphore.acquire().await;
                    match self.fallback.get_rest(path, params).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            tracing::warn!(path, "Fallback REST request failed: {e:#}");
                            return Value::Object(Map::new());
                        }
                    }
                }
            };

            if reply.status == STATUS_ACCEPTED {
                tracing::debug!(path, attempt, "REST path returned 202, retrying");
                sleep(self.retry_delay).await;
                continue;
            }
            if reply.body.is_null() {
                tracing::debug!(path, status = reply.status, "REST path returned no body");
                return Value::Object(Map::new());
            }
            return reply.body;
        }

        tracing::warn!(
            path,
            "There were too many 202s. Data for this repository will be incomplete."
        );
        Value::Object(Map::new())
    }
}
