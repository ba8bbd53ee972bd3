//! Trace spans for workflow stages.
//!
//! Every stage runs inside a [`StageSpan`]: a local `tracing` span for
//! log nesting plus a [`SpanRecord`] handed to the configured [`Tracer`]
//! when the stage ends. [`TraceContext`] is the value passed into
//! fan-out workers so their spans nest under the originating run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::TelemetryConfig;
use crate::error::TelemetryError;

/// Root span covering one query run.
pub const SPAN_QUERY: &str = "code_assistant_query";
/// Classification stage.
pub const SPAN_ANALYZE: &str = "orchestrator_analyze";
/// Single-agent stage.
pub const SPAN_CALL_AGENT: &str = "orchestrator_call_agent";
/// Fan-out stage.
pub const SPAN_CALL_AGENTS_PARALLEL: &str = "orchestrator_call_agents_parallel";
/// One backend invocation.
pub const SPAN_BACKEND_INVOKE: &str = "backend_invoke";
/// Synthesis stage.
pub const SPAN_COMBINE: &str = "orchestrator_combine";

/// Upper bound on waiting for the exporter to drain.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);
/// Upper bound on one collector connection attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Spans buffered ahead of the exporter before new ones are dropped.
const QUEUE_CAPACITY: usize = 1024;

/// A span attribute value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Text.
    Str(String),
    /// Integer.
    Int(i64),
    /// Flag.
    Bool(bool),
    /// Float.
    F64(f64),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

/// A finished span as shipped to the collector.
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    /// Trace this span belongs to.
    pub trace_id: Uuid,
    /// This span's id.
    pub span_id: Uuid,
    /// Enclosing span, `None` for the root.
    pub parent_id: Option<Uuid>,
    /// Span name.
    pub name: &'static str,
    /// Wall-clock start.
    pub start: DateTime<Utc>,
    /// Elapsed milliseconds.
    pub duration_ms: f64,
    /// Attributes set while the span was open.
    pub attributes: BTreeMap<String, AttrValue>,
}

/// Destination for finished spans.
///
/// Implementations must never block or fail the caller.
#[async_trait]
pub trait Tracer: Send + Sync + fmt::Debug {
    /// Accepts a finished span.
    fn export(&self, record: SpanRecord);

    /// Waits (bounded) until previously exported spans have been shipped.
    async fn flush(&self) {}
}

/// Tracer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn export(&self, _record: SpanRecord) {}
}

enum ExportMsg {
    Span(Box<SpanRecord>),
    Flush(oneshot::Sender<()>),
}

/// Tracer that ships spans as newline-delimited JSON over TCP.
///
/// A single background task owns the connection and drains a bounded
/// queue. When the queue is full the span is dropped and counted;
/// [`Tracer::export`] never waits. Connection or write failures are
/// logged at debug level and the affected span is dropped.
pub struct ExportingTracer {
    tx: mpsc::Sender<ExportMsg>,
    dropped: AtomicU64,
    service_name: String,
    endpoint: String,
}

impl ExportingTracer {
    /// Starts the exporter task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::NoRuntime`] outside a runtime.
    pub fn spawn(config: &TelemetryConfig) -> Result<Self, TelemetryError> {
        Self::with_capacity(config, QUEUE_CAPACITY)
    }

    /// Like [`ExportingTracer::spawn`] with an explicit queue capacity.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::NoRuntime`] outside a runtime.
    pub fn with_capacity(
        config: &TelemetryConfig,
        capacity: usize,
    ) -> Result<Self, TelemetryError> {
        let handle = Handle::try_current()?;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let endpoint = config.endpoint();
        handle.spawn(export_loop(rx, endpoint.clone()));
        Ok(Self {
            tx,
            dropped: AtomicU64::new(0),
            service_name: config.service_name.clone(),
            endpoint,
        })
    }

    /// Spans discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ExportingTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportingTracer")
            .field("endpoint", &self.endpoint)
            .field("service_name", &self.service_name)
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tracer for ExportingTracer {
    fn export(&self, mut record: SpanRecord) {
        record
            .attributes
            .insert("service.name".to_string(), self.service_name.clone().into());
        match self.tx.try_send(ExportMsg::Span(Box::new(record))) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                if let ExportMsg::Span(record) = msg {
                    debug!(span = record.name, "span queue full; dropping span");
                }
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        let _ = tokio::time::timeout(FLUSH_TIMEOUT, async {
            if self.tx.send(ExportMsg::Flush(ack_tx)).await.is_ok() {
                let _ = ack_rx.await;
            }
        })
        .await;
    }
}

/// Picks the tracer for a process: exporting when enabled, no-op otherwise.
///
/// Falls back to [`NoopTracer`] when export is enabled but no runtime is
/// available to run the exporter.
#[must_use]
pub fn tracer_from_config(config: &TelemetryConfig) -> Arc<dyn Tracer> {
    if !config.enabled {
        return Arc::new(NoopTracer);
    }
    match ExportingTracer::spawn(config) {
        Ok(tracer) => {
            debug!(endpoint = %config.endpoint(), "span export enabled");
            Arc::new(tracer)
        }
        Err(e) => {
            warn!(error = %e, "span export disabled");
            Arc::new(NoopTracer)
        }
    }
}

async fn export_loop(mut rx: mpsc::Receiver<ExportMsg>, endpoint: String) {
    let mut conn: Option<TcpStream> = None;
    while let Some(msg) = rx.recv().await {
        match msg {
            ExportMsg::Span(record) => {
                if let Err(e) = ship(&mut conn, &endpoint, &record).await {
                    debug!(error = %e, span = record.name, "span export failed");
                    conn = None;
                }
            }
            ExportMsg::Flush(ack) => {
                if let Some(stream) = conn.as_mut() {
                    let _ = stream.flush().await;
                }
                let _ = ack.send(());
            }
        }
    }
}

async fn ship(
    conn: &mut Option<TcpStream>,
    endpoint: &str,
    record: &SpanRecord,
) -> Result<(), TelemetryError> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    if conn.is_none() {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(endpoint))
            .await
            .map_err(|_| TelemetryError::ConnectTimeout {
                endpoint: endpoint.to_string(),
                timeout_ms: CONNECT_TIMEOUT.as_millis(),
            })?
            .map_err(|source| TelemetryError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        *conn = Some(stream);
    }
    if let Some(stream) = conn.as_mut() {
        stream.write_all(&line).await?;
    }
    Ok(())
}

/// Trace context propagated from the driving task into workers.
#[derive(Clone)]
pub struct TraceContext {
    trace_id: Uuid,
    parent_id: Option<Uuid>,
    span: tracing::Span,
    tracer: Arc<dyn Tracer>,
}

impl TraceContext {
    /// Starts a new trace under the caller's current `tracing` span.
    #[must_use]
    pub fn root(tracer: Arc<dyn Tracer>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            parent_id: None,
            span: tracing::Span::current(),
            tracer,
        }
    }

    /// Trace identifier shared by every span of the run.
    #[must_use]
    pub const fn trace_id(&self) -> Uuid {
        self.trace_id
    }

    /// Local span to run work under (`Instrument::instrument`).
    #[must_use]
    pub const fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Opens a child span of this context.
    #[must_use]
    pub fn start_span(&self, name: &'static str) -> StageSpan {
        let span = tracing::info_span!(parent: &self.span, "stage", stage = name);
        StageSpan {
            trace_id: self.trace_id,
            span_id: Uuid::new_v4(),
            parent_id: self.parent_id,
            name,
            started_at: Utc::now(),
            start: Instant::now(),
            attributes: BTreeMap::new(),
            span,
            tracer: Arc::clone(&self.tracer),
        }
    }
}

impl fmt::Debug for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceContext")
            .field("trace_id", &self.trace_id)
            .field("parent_id", &self.parent_id)
            .finish_non_exhaustive()
    }
}

/// An open stage span; exported when dropped.
pub struct StageSpan {
    trace_id: Uuid,
    span_id: Uuid,
    parent_id: Option<Uuid>,
    name: &'static str,
    started_at: DateTime<Utc>,
    start: Instant,
    attributes: BTreeMap<String, AttrValue>,
    span: tracing::Span,
    tracer: Arc<dyn Tracer>,
}

impl StageSpan {
    /// Sets (or replaces) an attribute.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Marks the span as failed with a message.
    pub fn record_error(&mut self, message: impl fmt::Display) {
        self.set("error", true);
        self.set("error.message", message.to_string());
    }

    /// Context for work nested under this span.
    #[must_use]
    pub fn context(&self) -> TraceContext {
        TraceContext {
            trace_id: self.trace_id,
            parent_id: Some(self.span_id),
            span: self.span.clone(),
            tracer: Arc::clone(&self.tracer),
        }
    }

    /// Local `tracing` span for this stage.
    #[must_use]
    pub const fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Time since the span opened.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Attribute lookup.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }
}

impl Drop for StageSpan {
    fn drop(&mut self) {
        let record = SpanRecord {
            trace_id: self.trace_id,
            span_id: self.span_id,
            parent_id: self.parent_id,
            name: self.name,
            start: self.started_at,
            duration_ms: self.start.elapsed().as_secs_f64() * 1000.0,
            attributes: std::mem::take(&mut self.attributes),
        };
        self.tracer.export(record);
    }
}


#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;

    use super::testing::CollectingTracer;
    use super::*;

    #[test]
    fn test_span_exported_on_drop_with_parent() {
        let tracer = Arc::new(CollectingTracer::default());
        let root = TraceContext::root(tracer.clone());
        {
            let mut outer = root.start_span(SPAN_QUERY);
            outer.set("query", "hello");
            let mut inner = outer.context().start_span(SPAN_ANALYZE);
            inner.record_error("boom");
        }

        let spans = tracer.spans();
        assert_eq!(spans.len(), 2);
        let (inner, outer) = (&spans[0], &spans[1]);
        assert_eq!(inner.name, SPAN_ANALYZE);
        assert_eq!(inner.parent_id, Some(outer.span_id));
        assert_eq!(inner.trace_id, outer.trace_id);
        assert_eq!(outer.parent_id, None);
        assert_eq!(inner.attributes.get("error"), Some(&AttrValue::Bool(true)));
        assert_eq!(
            outer.attributes.get("query"),
            Some(&AttrValue::Str("hello".into()))
        );
    }

    #[test]
    fn test_attr_value_serializes_untagged() {
        let json = serde_json::to_string(&AttrValue::Int(3)).unwrap_or_default();
        assert_eq!(json, "3");
        let json = serde_json::to_string(&AttrValue::from("x")).unwrap_or_default();
        assert_eq!(json, "\"x\"");
    }

    #[tokio::test]
    async fn test_exporting_tracer_writes_ndjson() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|_| unreachable!());
        let port = listener
            .local_addr()
            .unwrap_or_else(|_| unreachable!())
            .port();
        let config = TelemetryConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port,
            service_name: "test-svc".to_string(),
        };
        let tracer: Arc<dyn Tracer> =
            Arc::new(ExportingTracer::spawn(&config).unwrap_or_else(|_| unreachable!()));

        drop(TraceContext::root(Arc::clone(&tracer)).start_span(SPAN_COMBINE));
        tracer.flush().await;

        let (socket, _) = listener.accept().await.unwrap_or_else(|_| unreachable!());
        let mut lines = BufReader::new(socket).lines();
        let line = lines
            .next_line()
            .await
            .unwrap_or_else(|_| unreachable!())
            .unwrap_or_default();
        let value: serde_json::Value =
            serde_json::from_str(&line).unwrap_or_else(|_| unreachable!());
        assert_eq!(value["name"], SPAN_COMBINE);
        assert_eq!(value["attributes"]["service.name"], "test-svc");
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_ignored() {
        let config = TelemetryConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 1,
            service_name: "svc".to_string(),
        };
        let tracer = ExportingTracer::spawn(&config).unwrap_or_else(|_| unreachable!());
        tracer.export(record(SPAN_ANALYZE));
        tracer.flush().await;
    }

    fn record(name: &'static str) -> SpanRecord {
        SpanRecord {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_id: None,
            name,
            start: Utc::now(),
            duration_ms: 1.0,
            attributes: BTreeMap::new(),
        }
    }

    // Current-thread runtime: the exporter task cannot run until the
    // test yields, so the queue fills deterministically.
    #[tokio::test]
    async fn test_full_queue_drops_without_waiting() {
        let config = TelemetryConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 1,
            service_name: "svc".to_string(),
        };
        let tracer = ExportingTracer::with_capacity(&config, 2).unwrap_or_else(|_| unreachable!());

        for _ in 0..5 {
            tracer.export(record(SPAN_BACKEND_INVOKE));
        }
        assert_eq!(tracer.dropped(), 3);

        tokio::time::timeout(Duration::from_secs(10), tracer.flush())
            .await
            .unwrap_or_else(|_| unreachable!());
    }

    #[test]
    fn test_spawn_outside_runtime_is_an_error() {
        let config = TelemetryConfig {
            enabled: true,
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            ExportingTracer::spawn(&config),
            Err(TelemetryError::NoRuntime(_))
        ));
    }

    #[test]
    fn test_enabled_without_runtime_falls_back_to_noop() {
        let config = TelemetryConfig {
            enabled: true,
            ..TelemetryConfig::default()
        };
        let tracer = tracer_from_config(&config);
        assert_eq!(format!("{tracer:?}"), "NoopTracer");
    }

    #[test]
    fn test_disabled_config_selects_noop() {
        let tracer = tracer_from_config(&TelemetryConfig::default());
        assert_eq!(format!("{tracer:?}"), "NoopTracer");
    }
}
