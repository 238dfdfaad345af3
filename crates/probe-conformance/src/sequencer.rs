//! Conversation sequencer.
//!
//! Sends negotiate, enumerate and invoke in order over one line
//! transport, one pending request at a time, and stops at the first
//! failing step. Every read and write is bounded by the step's own
//! wait and by the run deadline, whichever is sooner.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use probe_protocol::{decode_reply, encode_request, JsonRpcReply};
use probe_transport_stdio::{LineTransport, StderrCollector, TransportError};
use probe_types::{ProbeError, StepKind, StepVerdict};

use crate::error::ConformanceError;
use crate::step::{ConversationConfig, ConversationStep};
use crate::validator::validate;

/// Drives the fixed conversation against one server.
pub struct Sequencer<R, W> {
    transport: LineTransport<R, W>,
    config: ConversationConfig,
    stderr: Option<StderrCollector>,
    deadline: Option<(Instant, Duration)>,
}

/// Which bound limited a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Step,
    Deadline,
}

impl<R, W> Sequencer<R, W>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    /// Creates a sequencer with no run deadline and no stderr source.
    pub fn new(transport: LineTransport<R, W>, config: ConversationConfig) -> Self {
        Self {
            transport,
            config,
            stderr: None,
            deadline: None,
        }
    }

    /// Attaches the collector that supplies the invoke diagnostic.
    pub fn with_stderr(mut self, stderr: Option<StderrCollector>) -> Self {
        self.stderr = stderr;
        self
    }

    /// Bounds the whole conversation. `budget` is only used in messages.
    pub fn with_deadline(mut self, deadline: Instant, budget: Duration) -> Self {
        self.deadline = Some((deadline, budget));
        self
    }

    /// Runs every step until one fails. Returns the verdicts of the
    /// steps that were attempted, in order.
    pub async fn run(mut self) -> Vec<StepVerdict> {
        let mut verdicts = Vec::with_capacity(StepKind::ALL.len());

        for (index, kind) in StepKind::ALL.into_iter().enumerate() {
            let id = index as i64 + 1;
            let verdict = match ConversationStep::build(kind, id, &self.config) {
                Ok(step) => self.run_step(&step).await,
                Err(e) => StepVerdict::fail(kind, ProbeError::from(e)),
            };

            let passed = verdict.passed();
            match &verdict.failure {
                None => info!(step = %kind, "step passed"),
                Some(failure) => warn!(
                    step = %kind,
                    kind = %failure.kind,
                    "step failed: {}",
                    failure.message
                ),
            }
            verdicts.push(verdict);
            if !passed {
                break;
            }
        }

        verdicts
    }

    async fn run_step(&mut self, step: &ConversationStep) -> StepVerdict {
        info!(
            step = %step.kind,
            id = %step.id(),
            method = %step.request.method,
            "sending request"
        );

        match self.exchange(step).await {
            Ok(reply) => validate(step, &reply),
            Err(e @ ConformanceError::NoResponse { .. }) if step.kind == StepKind::Invoke => {
                let diagnostic = self.stderr_diagnostic().await;
                let verdict = StepVerdict::fail(step.kind, ProbeError::from(e));
                match diagnostic {
                    Some(line) => verdict.with_diagnostic(line),
                    None => verdict,
                }
            }
            Err(e) => StepVerdict::fail(step.kind, ProbeError::from(e)),
        }
    }

    /// Writes the step's request and reads exactly one reply line.
    async fn exchange(
        &mut self,
        step: &ConversationStep,
    ) -> Result<JsonRpcReply, ConformanceError> {
        let kind = step.kind;

        // 1. Encode
        let line = encode_request(&step.request).map_err(|e| ConformanceError::Encode {
            step: kind,
            reason: e.to_string(),
        })?;
        debug!(step = %kind, "-> {line}");

        // 2. Write
        let (limit, bound) = self.bounded(self.config.response_timeout);
        if let Err(e) = self.transport.write_line_within(&line, limit).await {
            return Err(self.classify(kind, e, bound));
        }

        // 3. Read one line
        let (limit, bound) = self.bounded(self.config.read_timeout(kind));
        let received = match self.transport.read_line_within(limit).await {
            Ok(Some(received)) => received,
            Ok(None) => {
                return Err(ConformanceError::NoResponse {
                    step: kind,
                    reason: "server closed stdout".into(),
                })
            }
            Err(e) => return Err(self.classify(kind, e, bound)),
        };
        if received.is_empty() {
            return Err(ConformanceError::NoResponse {
                step: kind,
                reason: "received an empty line".into(),
            });
        }
        debug!(step = %kind, "<- {received}");

        // 4. Decode
        decode_reply(&received).map_err(|e| ConformanceError::MalformedMessage {
            step: kind,
            reason: e.to_string(),
            raw: received,
        })
    }

    /// The step's wait, cut short by whatever is left of the deadline.
    fn bounded(&self, step_wait: Duration) -> (Duration, Bound) {
        match self.deadline {
            Some((deadline, _)) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining <= step_wait {
                    (remaining, Bound::Deadline)
                } else {
                    (step_wait, Bound::Step)
                }
            }
            None => (step_wait, Bound::Step),
        }
    }

    fn classify(&self, step: StepKind, e: TransportError, bound: Bound) -> ConformanceError {
        match (e, bound) {
            (TransportError::Timeout { .. }, Bound::Deadline) => ConformanceError::Timeout {
                step,
                deadline_ms: self
                    .deadline
                    .map(|(_, budget)| budget.as_millis() as u64)
                    .unwrap_or_default(),
            },
            (TransportError::Timeout { timeout_ms }, Bound::Step) => ConformanceError::NoResponse {
                step,
                reason: format!("no reply within {timeout_ms}ms"),
            },
            (TransportError::ConnectionClosed, _) => ConformanceError::NoResponse {
                step,
                reason: "server closed stdin".into(),
            },
            (TransportError::InvalidUtf8 { raw }, _) => ConformanceError::MalformedMessage {
                step,
                reason: "line is not valid UTF-8".into(),
                raw,
            },
            (source, _) => ConformanceError::Transport { step, source },
        }
    }

    async fn stderr_diagnostic(&self) -> Option<String> {
        let collector = self.stderr.as_ref()?;
        let line = collector.last_line(self.config.stderr_wait).await;
        if let Some(line) = &line {
            debug!(diagnostic = %line, "captured stderr diagnostic");
        }
        line
    }
}

/// Runs the conversation over an already-connected transport.
pub async fn run_conversation<R, W>(
    transport: LineTransport<R, W>,
    stderr: Option<StderrCollector>,
    config: ConversationConfig,
) -> Vec<StepVerdict>
where
    R: tokio::io::AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    Sequencer::new(transport, config)
        .with_stderr(stderr)
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_types::FailureKind;
    use serde_json::{json, Value};
    use tokio::io::{
        duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf,
        WriteHalf,
    };
    use tokio::task::JoinHandle;

    type Transport = LineTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    /// One scripted answer per received request. `None` closes the peer.
    type Script = Box<dyn FnMut(&Value) -> Option<String> + Send>;

    fn connect(mut script: Script) -> (Transport, JoinHandle<Vec<Value>>) {
        let (client, server) = duplex(64 * 1024);
        let (client_rx, client_tx) = split(client);
        let (server_rx, mut server_tx) = split(server);

        let peer = tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut lines = BufReader::new(server_rx).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).expect("request json");
                let answer = script(&request);
                seen.push(request);
                match answer {
                    Some(text) => {
                        server_tx.write_all(text.as_bytes()).await.expect("write");
                        server_tx.write_all(b"\n").await.expect("write");
                        server_tx.flush().await.expect("flush");
                    }
                    None => break,
                }
            }
            seen
        });

        (LineTransport::new(client_rx, client_tx), peer)
    }

    fn conformant(tools: Value) -> Script {
        Box::new(move |request: &Value| {
            let id = request["id"].clone();
            let result = match request["method"].as_str() {
                Some("initialize") => json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake", "version": "0.1.0"}
                }),
                Some("tools/list") => json!({ "tools": tools.clone() }),
                Some("tools/call") => json!({"content": [{"type": "text", "text": "选项1"}]}),
                _ => return None,
            };
            Some(json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string())
        })
    }

    fn config() -> ConversationConfig {
        ConversationConfig {
            response_timeout: Duration::from_millis(500),
            invoke_timeout: Duration::from_millis(500),
            stderr_wait: Duration::from_millis(50),
            ..ConversationConfig::default()
        }
    }

    fn failure_kind(verdicts: &[StepVerdict]) -> Option<FailureKind> {
        verdicts.last()?.failure.as_ref().map(|f| f.kind)
    }

    #[tokio::test]
    async fn conformant_peer_passes_every_step() {
        let (transport, peer) = connect(conformant(json!([{"name": "zhi"}])));
        let verdicts = run_conversation(transport, None, config()).await;

        assert_eq!(verdicts.len(), 3);
        assert!(verdicts.iter().all(StepVerdict::passed));
        assert!(verdicts[0].details.iter().any(|d| d == "server: fake 0.1.0"));

        let seen = peer.await.expect("peer");
        let ids: Vec<i64> = seen.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(seen[2]["params"]["name"], "zhi");
    }

    #[tokio::test]
    async fn missing_capability_stops_before_invoke() {
        let (transport, peer) = connect(conformant(json!([{"name": "other"}])));
        let verdicts = run_conversation(transport, None, config()).await;

        assert_eq!(verdicts.len(), 2);
        assert_eq!(failure_kind(&verdicts), Some(FailureKind::CapabilityNotFound));

        let seen = peer.await.expect("peer");
        assert!(seen.iter().all(|r| r["method"] != "tools/call"));
    }

    #[tokio::test]
    async fn peer_closing_is_no_response() {
        let (transport, _peer) = connect(Box::new(|_: &Value| None));
        let verdicts = run_conversation(transport, None, config()).await;

        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].step, StepKind::Negotiate);
        assert_eq!(failure_kind(&verdicts), Some(FailureKind::NoResponse));
    }

    #[tokio::test]
    async fn garbage_reply_is_malformed_with_raw_text() {
        let (transport, _peer) =
            connect(Box::new(|_: &Value| Some("server ready!".to_string())));
        let verdicts = run_conversation(transport, None, config()).await;

        let failure = verdicts[0].failure.as_ref().expect("failure");
        assert_eq!(failure.kind, FailureKind::MalformedMessage);
        assert_eq!(failure.context.as_deref(), Some("raw: server ready!"));
    }

    #[tokio::test]
    async fn non_utf8_reply_is_malformed_with_raw_text() {
        let (client, server) = duplex(1024);
        let (client_rx, client_tx) = split(client);
        let (server_rx, mut server_tx) = split(server);
        let _peer = tokio::spawn(async move {
            let mut lines = BufReader::new(server_rx).lines();
            if let Ok(Some(_)) = lines.next_line().await {
                server_tx.write_all(b"\xff\xfe not json\n").await.expect("write");
                server_tx.flush().await.expect("flush");
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let verdicts =
            run_conversation(LineTransport::new(client_rx, client_tx), None, config()).await;

        let failure = verdicts[0].failure.as_ref().expect("failure");
        assert_eq!(failure.kind, FailureKind::MalformedMessage);
        let context = failure.context.as_deref().expect("raw text");
        assert!(context.starts_with("raw: "));
        assert!(context.ends_with(" not json"));
    }

    #[tokio::test]
    async fn blank_reply_is_no_response() {
        let (transport, _peer) = connect(Box::new(|_: &Value| Some(String::new())));
        let verdicts = run_conversation(transport, None, config()).await;
        assert_eq!(failure_kind(&verdicts), Some(FailureKind::NoResponse));
    }

    #[tokio::test]
    async fn wrong_id_is_rejected() {
        let (transport, _peer) = connect(Box::new(|_: &Value| {
            Some(r#"{"jsonrpc":"2.0","id":99,"result":{}}"#.to_string())
        }));
        let verdicts = run_conversation(transport, None, config()).await;
        assert_eq!(failure_kind(&verdicts), Some(FailureKind::IdMismatch));
    }

    #[tokio::test]
    async fn error_reply_to_initialize_is_rejection() {
        let (transport, _peer) = connect(Box::new(|request: &Value| {
            Some(
                json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "error": {"code": -32601, "message": "Method not found"}
                })
                .to_string(),
            )
        }));
        let verdicts = run_conversation(transport, None, config()).await;
        assert_eq!(failure_kind(&verdicts), Some(FailureKind::NegotiationRejected));
    }

    #[tokio::test]
    async fn silent_peer_times_out_as_no_response() {
        let (client, _server) = duplex(1024);
        let (rx, tx) = split(client);
        let verdicts = run_conversation(LineTransport::new(rx, tx), None, config()).await;

        let failure = verdicts[0].failure.as_ref().expect("failure");
        assert_eq!(failure.kind, FailureKind::NoResponse);
        assert!(failure.message.contains("500ms"));
    }

    #[tokio::test]
    async fn expired_run_deadline_is_timeout() {
        let (client, _server) = duplex(1024);
        let (rx, tx) = split(client);
        let verdicts = Sequencer::new(LineTransport::new(rx, tx), config())
            .with_deadline(
                Instant::now() + Duration::from_millis(100),
                Duration::from_millis(100),
            )
            .run()
            .await;

        let failure = verdicts[0].failure.as_ref().expect("failure");
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert!(failure.message.contains("100ms"));
    }

    #[tokio::test]
    async fn invoke_no_response_carries_stderr_line() {
        let (transport, _peer) = connect(Box::new({
            let mut inner = conformant(json!([{"name": "zhi"}]));
            move |request: &Value| {
                if request["method"] == "tools/call" {
                    return None;
                }
                inner(request)
            }
        }));
        let stderr = StderrCollector::spawn(&b"starting\npopup unavailable\n"[..], 8);

        let verdicts = run_conversation(transport, Some(stderr), config()).await;

        assert_eq!(verdicts.len(), 3);
        let invoke = &verdicts[2];
        assert_eq!(invoke.failure.as_ref().map(|f| f.kind), Some(FailureKind::NoResponse));
        assert_eq!(invoke.diagnostic.as_deref(), Some("popup unavailable"));
    }
}
