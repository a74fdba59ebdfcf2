//! HTTP streaming client for one node.
//!
//! A request is `POST http://{ip}:{port}/{request_name}` with a JSON body
//! describing the [`RequestSpec`]; the node answers with a chunked text body.
//! A timeout while reading the body earns one more attempt; anything else
//! ends the stream for good. Every attempt, however it ends, sends
//! [`StreamFragment::End`].

use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::decode::Utf8Decoder;
use super::{FragmentStream, StreamReport};
use crate::config::ValidatorConfig;
use crate::domain::{
    ArbiterError, NodeAddress, NodeId, ProviderKind, RequestSpec, Result, StreamFragment,
    StreamOutcome, Turn,
};
use crate::metrics::METRICS;

/// Hard cap on attempts per stream, the first one included.
pub const MAX_STREAM_ATTEMPTS: u32 = 2;

/// The four independent timeout budgets of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutBudget {
    /// Ceiling on the whole exchange.
    pub total: Duration,
    pub connect: Duration,
    /// Sending the request body and receiving the response head.
    pub write: Duration,
    /// Waiting for each body chunk.
    pub read: Duration,
}

impl TimeoutBudget {
    /// Connect, write and read all derive from the caller's per-node timeout.
    pub fn new(per_node: Duration, total: Duration) -> Self {
        Self {
            total: total.max(per_node),
            connect: per_node,
            write: per_node,
            read: per_node,
        }
    }
}

/// JSON body sent to a node.
#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    uid: NodeId,
    messages: &'a [Turn],
    model: &'a str,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    seed: u64,
    max_tokens: u32,
    provider: ProviderKind,
    timeout: f64,
    streaming: bool,
}

impl<'a> WireRequest<'a> {
    fn from_spec(spec: &'a RequestSpec) -> Self {
        Self {
            uid: spec.node,
            messages: &spec.messages,
            model: &spec.model,
            temperature: spec.sampling.temperature,
            top_p: spec.sampling.top_p,
            top_k: spec.sampling.top_k,
            seed: spec.sampling.seed,
            max_tokens: spec.sampling.max_tokens,
            provider: spec.provider,
            timeout: spec.timeout.as_secs_f64(),
            streaming: true,
        }
    }
}

/// Sends [`StreamFragment::End`] when an attempt scope is left, on every path.
struct EndOfAttempt<'a>(&'a UnboundedSender<StreamFragment>);

impl Drop for EndOfAttempt<'_> {
    fn drop(&mut self) {
        let _ = self.0.send(StreamFragment::End);
    }
}

/// Opens streaming requests against nodes.
#[derive(Debug, Clone)]
pub struct StreamingClient {
    request_name: String,
    external_ip: Option<IpAddr>,
    total_timeout: Duration,
}

impl StreamingClient {
    pub fn new(request_name: impl Into<String>, external_ip: Option<IpAddr>, total_timeout: Duration) -> Self {
        Self {
            request_name: request_name.into(),
            external_ip,
            total_timeout,
        }
    }

    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(
            config.request_name.clone(),
            config.external_ip,
            config.total_timeout(),
        )
    }

    /// `host:port` to dial. A node sharing our external address is reached
    /// over loopback rather than through the public network.
    pub fn endpoint(&self, address: &NodeAddress) -> String {
        let ip = if Some(address.ip) == self.external_ip {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            address.ip
        };
        match ip {
            IpAddr::V4(v4) => format!("{}:{}", v4, address.port),
            IpAddr::V6(v6) => format!("[{}]:{}", v6, address.port),
        }
    }

    pub fn url(&self, address: &NodeAddress) -> String {
        format!("http://{}/{}", self.endpoint(address), self.request_name)
    }

    /// Start streaming `spec` from the node at `address`.
    ///
    /// Returns immediately; fragments arrive on the returned stream as the
    /// node produces them. Must be called inside a Tokio runtime.
    pub fn open_stream(&self, address: NodeAddress, spec: RequestSpec) -> FragmentStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let node = spec.node;
        let client = self.clone();
        let producer = tokio::spawn(async move { client.produce(address, spec, tx).await });
        FragmentStream::new(node, rx, producer)
    }

    async fn produce(
        self,
        address: NodeAddress,
        spec: RequestSpec,
        tx: UnboundedSender<StreamFragment>,
    ) -> StreamReport {
        let start = Instant::now();
        let budget = TimeoutBudget::new(spec.timeout, self.total_timeout);
        let url = self.url(&address);
        let mut attempts = 0;

        let prepared = reqwest::Client::builder()
            .timeout(budget.total)
            .connect_timeout(budget.connect)
            .read_timeout(budget.read)
            .build()
            .map_err(|e| ArbiterError::Connection {
                node: spec.node,
                detail: e.to_string(),
            })
            .and_then(|http| {
                let body = serde_json::to_vec(&WireRequest::from_spec(&spec))?;
                Ok((http, body))
            });

        let (http, body) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let _end = EndOfAttempt(&tx);
                error!(node = %spec.node, error = %e, "could not prepare stream request");
                return self.report(&spec, attempts, None, unreachable(&e));
            }
        };
        let body_hash = hex::encode(Sha256::digest(&body));

        info!(
            node = %spec.node,
            model = %spec.model,
            timeout_secs = spec.timeout.as_secs_f64(),
            prompt = %spec.prompt_preview(),
            "sending stream request"
        );

        loop {
            attempts += 1;
            METRICS.inc_streams_opened();
            let _end = EndOfAttempt(&tx);

            let result = self
                .attempt(&http, &url, &spec, &body, &body_hash, &budget, start, &tx)
                .await;

            match result {
                Ok(()) => {
                    let elapsed = start.elapsed();
                    debug!(node = %spec.node, elapsed_ms = elapsed.as_millis() as u64, "stream completed");
                    return self.report(&spec, attempts, Some(elapsed), StreamOutcome::Completed);
                }
                Err(e) if e.is_timeout() && attempts < MAX_STREAM_ATTEMPTS => {
                    warn!(node = %spec.node, attempt = attempts, error = %e, "stream timed out, retrying");
                    METRICS.inc_stream_retries();
                }
                Err(e) if e.is_timeout() => {
                    warn!(node = %spec.node, attempts, error = %e, "stream timed out on every attempt");
                    METRICS.inc_stream_failures();
                    return self.report(&spec, attempts, None, StreamOutcome::Exhausted { attempts });
                }
                Err(e @ ArbiterError::Connection { .. }) => {
                    error!(
                        node = %spec.node,
                        provider = %spec.provider,
                        model = %spec.model,
                        error = %e,
                        "could not reach node"
                    );
                    METRICS.inc_stream_failures();
                    return self.report(&spec, attempts, None, unreachable(&e));
                }
                Err(e) => {
                    error!(
                        node = %spec.node,
                        provider = %spec.provider,
                        model = %spec.model,
                        error = %e,
                        "stream interrupted, keeping partial response"
                    );
                    METRICS.inc_stream_failures();
                    return self.report(
                        &spec,
                        attempts,
                        Some(start.elapsed()),
                        StreamOutcome::Interrupted {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    /// One open-and-drain attempt.
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        http: &reqwest::Client,
        url: &str,
        spec: &RequestSpec,
        body: &[u8],
        body_hash: &str,
        budget: &TimeoutBudget,
        start: Instant,
        tx: &UnboundedSender<StreamFragment>,
    ) -> Result<()> {
        let node = spec.node;
        let request = http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-request-name", &self.request_name)
            .header("x-protocol-version", env!("CARGO_PKG_VERSION"))
            .header("x-request-id", Uuid::new_v4().to_string())
            .header("x-node-id", node.to_string())
            .header("x-timeout", spec.timeout.as_secs_f64().to_string())
            .header("x-body-hash", body_hash)
            .body(body.to_vec())
            .send();

        let connection_error = |detail: String| ArbiterError::Connection { node, detail };

        let mut response = match tokio::time::timeout(budget.connect + budget.write, request).await {
            Err(_) => {
                return Err(connection_error(format!(
                    "no response head within {:?}",
                    budget.connect + budget.write
                )))
            }
            Ok(Err(e)) => return Err(connection_error(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(connection_error(format!("node answered with status {status}")));
        }

        let mut decoder = Utf8Decoder::new();
        loop {
            let chunk = match tokio::time::timeout(budget.read, response.chunk()).await {
                Err(_) => None,
                Ok(Err(e)) if e.is_timeout() => None,
                Ok(Err(e)) => {
                    return Err(ArbiterError::StreamDecode {
                        node,
                        detail: e.to_string(),
                    })
                }
                Ok(Ok(chunk)) => Some(chunk),
            };

            let Some(chunk) = chunk else {
                return Err(ArbiterError::Timeout {
                    node,
                    elapsed_ms: start.elapsed().as_millis() as u64,
                });
            };

            match chunk {
                Some(bytes) => {
                    let text = match decoder.push(&bytes) {
                        Ok(text) => text,
                        Err(invalid) => {
                            if !invalid.text.is_empty() {
                                let _ = tx.send(StreamFragment::Text(invalid.text));
                            }
                            return Err(ArbiterError::StreamDecode {
                                node,
                                detail: invalid.detail,
                            });
                        }
                    };
                    if text.is_empty() {
                        continue;
                    }
                    tracing::trace!(node = %node, fragment = %text);
                    if tx.send(StreamFragment::Text(text)).is_err() {
                        // Consumer went away; nothing left to deliver to.
                        return Ok(());
                    }
                }
                None => {
                    decoder
                        .finish()
                        .map_err(|detail| ArbiterError::StreamDecode { node, detail })?;
                    return Ok(());
                }
            }
        }
    }

    fn report(
        &self,
        spec: &RequestSpec,
        attempts: u32,
        elapsed: Option<Duration>,
        outcome: StreamOutcome,
    ) -> StreamReport {
        StreamReport {
            node: spec.node,
            attempts,
            elapsed,
            outcome,
        }
    }
}

fn unreachable(e: &ArbiterError) -> StreamOutcome {
    StreamOutcome::Unreachable {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SamplingParams;

    fn client(external: Option<&str>) -> StreamingClient {
        StreamingClient::new(
            "StreamPrompting",
            external.map(|ip| ip.parse().unwrap()),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_own_address_is_dialed_over_loopback() {
        let address = NodeAddress::new("203.0.113.7".parse().unwrap(), 8091);
        assert_eq!(client(Some("203.0.113.7")).endpoint(&address), "127.0.0.1:8091");
        assert_eq!(client(Some("198.51.100.1")).endpoint(&address), "203.0.113.7:8091");
        assert_eq!(client(None).url(&address), "http://203.0.113.7:8091/StreamPrompting");
    }

    #[test]
    fn test_ipv6_endpoint_is_bracketed() {
        let address = NodeAddress::new("2001:db8::1".parse().unwrap(), 9000);
        assert_eq!(client(None).endpoint(&address), "[2001:db8::1]:9000");
    }

    #[test]
    fn test_budget_derives_from_per_node_timeout() {
        let budget = TimeoutBudget::new(Duration::from_secs(12), Duration::from_secs(300));
        assert_eq!(budget.connect, Duration::from_secs(12));
        assert_eq!(budget.write, Duration::from_secs(12));
        assert_eq!(budget.read, Duration::from_secs(12));
        assert_eq!(budget.total, Duration::from_secs(300));

        let budget = TimeoutBudget::new(Duration::from_secs(400), Duration::from_secs(300));
        assert_eq!(budget.total, Duration::from_secs(400));
    }

    #[test]
    fn test_wire_body_carries_spec_fields() {
        let spec = RequestSpec {
            node: NodeId(9),
            messages: vec![Turn::user("hello")],
            model: "gpt-4o".to_string(),
            sampling: SamplingParams::default(),
            provider: ProviderKind::OpenAi,
            timeout: Duration::from_secs(12),
        };
        let body = serde_json::to_value(WireRequest::from_spec(&spec)).unwrap();
        assert_eq!(body["uid"], 9);
        assert_eq!(body["provider"], "OpenAI");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["timeout"], 12.0);
        assert_eq!(body["streaming"], true);
    }
}
