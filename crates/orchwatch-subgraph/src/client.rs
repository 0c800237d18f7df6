//! HTTP GraphQL client for the Livepeer subgraph.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::SubgraphError;
use crate::types::{GraphQlResponse, Transcoder};

const ACTIVE_TRANSCODERS_QUERY: &str = r#"
{
  transcoders(where: {active: true}) {
    id
    feeShare
    rewardCut
    lastRewardRound {
      id
    }
    activationRound
    deactivationRound
    totalStake
    serviceURI
    active
    status
    pools(first: 1, orderBy: id, orderDirection: desc) {
      totalStake
    }
  }
}
"#;

/// Bulk read access to transcoder state indexed by the subgraph.
#[async_trait]
pub trait LivepeerSubgraph: Send + Sync {
    async fn get_active_transcoders(&self) -> Result<Vec<Transcoder>, SubgraphError>;
}

pub struct SubgraphClient {
    http: reqwest::Client,
    url: Url,
}

impl SubgraphClient {
    /// `addr` must be an absolute `http` or `https` URL.
    pub fn new(addr: &str, timeout: Duration) -> Result<Self, SubgraphError> {
        let url = validate_url(addr)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl LivepeerSubgraph for SubgraphClient {
    async fn get_active_transcoders(&self) -> Result<Vec<Transcoder>, SubgraphError> {
        let resp = self
            .http
            .post(self.url.clone())
            .json(&json!({ "query": ACTIVE_TRANSCODERS_QUERY }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(SubgraphError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let transcoders = parse_transcoders(&body)?;
        debug!(url = %self.url, count = transcoders.len(), "fetched active transcoders");
        Ok(transcoders)
    }
}

fn validate_url(addr: &str) -> Result<Url, SubgraphError> {
    let invalid = |reason: String| SubgraphError::InvalidUrl {
        url: addr.to_string(),
        reason,
    };
    let url = Url::parse(addr).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

/// Parse a `transcoders` query response body.
pub fn parse_transcoders(body: &str) -> Result<Vec<Transcoder>, SubgraphError> {
    let resp: GraphQlResponse = serde_json::from_str(body)?;
    let Some(data) = resp.data else {
        let messages: Vec<_> = resp.errors.into_iter().map(|e| e.message).collect();
        return Err(SubgraphError::Decode(if messages.is_empty() {
            "response has no data".into()
        } else {
            messages.join("; ")
        }));
    };
    data.transcoders.into_iter().map(|t| t.parse()).collect()
}
