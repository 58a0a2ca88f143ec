//! Relay loop and fan-out
//!
//! One `RelayLoop` drives one run: it pulls raw events from a
//! `RunEventSource`, classifies and deduplicates them, and forwards
//! the resulting wire events in order to a bounded channel. The
//! `StreamRelay` façade multiplexes many such runs, one spawned task
//! each, on top of the session lifecycle manager.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::classify::classify_event;
use crate::config::RelayConfig;
use crate::dedup::StreamingRunContext;
use crate::error::{Error, Result};
use crate::event::{RawRunEvent, WireEvent, WireEventKind};
use crate::session::SessionLifecycleManager;
use crate::store::{InMemoryMemoryStore, InMemorySessionStore, MemoryHit, MemoryStore, SessionStore};

/// Upstream feed of raw run events
///
/// Finite and non-restartable; an `Err` item terminates the sequence.
#[async_trait]
pub trait RunEventSource: Send {
    /// Pull the next raw event, or `None` when the run is exhausted
    async fn next_event(&mut self) -> Option<Result<RawRunEvent>>;
}

#[async_trait]
impl RunEventSource for mpsc::Receiver<Result<RawRunEvent>> {
    async fn next_event(&mut self) -> Option<Result<RawRunEvent>> {
        self.recv().await
    }
}

/// Adapter feeding a relay from any stream of raw event results
pub struct StreamSource<S>(pub S);

#[async_trait]
impl<S> RunEventSource for StreamSource<S>
where
    S: futures::Stream<Item = Result<RawRunEvent>> + Unpin + Send,
{
    async fn next_event(&mut self) -> Option<Result<RawRunEvent>> {
        self.0.next().await
    }
}

/// A pre-scripted event source
pub struct ScriptedSource {
    events: std::vec::IntoIter<Result<RawRunEvent>>,
}

impl ScriptedSource {
    /// Source yielding the given events in order, then exhaustion
    pub fn new(events: Vec<RawRunEvent>) -> Self {
        Self {
            events: events.into_iter().map(Ok).collect::<Vec<_>>().into_iter(),
        }
    }

    /// Source yielding the given events, then a terminal failure
    pub fn failing_after(events: Vec<RawRunEvent>, error: Error) -> Self {
        let mut items: Vec<Result<RawRunEvent>> = events.into_iter().map(Ok).collect();
        items.push(Err(error));
        Self {
            events: items.into_iter(),
        }
    }
}

#[async_trait]
impl RunEventSource for ScriptedSource {
    async fn next_event(&mut self) -> Option<Result<RawRunEvent>> {
        self.events.next()
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Source exhausted normally; `complete` was the last event
    Completed,
    /// Source raised; `error` was the last event
    Errored,
    /// The consumer went away mid-run
    Disconnected,
}

/// Accounting for one finished run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Wire events actually delivered to the consumer
    pub events_emitted: u64,
}

/// Best-effort recording of delivered events into the session store
struct EventRecorder {
    store: Arc<dyn SessionStore>,
    app_name: String,
    user_id: String,
    session_id: String,
}

impl EventRecorder {
    async fn record(&self, event: &WireEvent) {
        let value = match serde_json::to_value(event) {
            Ok(v) => v,
            Err(e) => {
                debug!("Failed to serialize event for recording: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .store
            .append_event(&self.app_name, &self.user_id, &self.session_id, value)
            .await
        {
            debug!(session_id = %self.session_id, "Failed to record event: {}", e);
        }
    }
}

/// Drives exactly one run to completion
pub struct RelayLoop {
    user_id: String,
    output_tx: mpsc::Sender<WireEvent>,
    recorder: Option<EventRecorder>,
    ctx: StreamingRunContext,
}

impl RelayLoop {
    /// Create a loop for one run, delivering into `output_tx`
    pub fn new(
        session_id: &str,
        agent_id: &str,
        user_id: &str,
        output_tx: mpsc::Sender<WireEvent>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            output_tx,
            recorder: None,
            ctx: StreamingRunContext::new(session_id, agent_id),
        }
    }

    /// Also record every delivered event into the session store
    pub fn with_recorder(mut self, store: Arc<dyn SessionStore>, app_name: &str) -> Self {
        self.recorder = Some(EventRecorder {
            store,
            app_name: app_name.to_string(),
            user_id: self.user_id.clone(),
            session_id: self.ctx.session_id().to_string(),
        });
        self
    }

    /// Run until the source is exhausted, raises, or the consumer
    /// disconnects
    ///
    /// Emits `start` before the first pull, then exactly one terminal
    /// `complete` or `error`. The run context and recorder are
    /// released on every exit path, including task cancellation.
    pub async fn run<S: RunEventSource>(mut self, mut source: S) -> RunSummary {
        let session_id = self.ctx.session_id().to_string();
        let agent_id = self.ctx.agent_id().to_string();
        let mut emitted: u64 = 0;

        debug!(session_id = %session_id, agent_id = %agent_id, "Starting run");

        // The client sees liveness even when the source is slow to
        // produce its first item
        let start = WireEvent::start(&session_id, &agent_id, &self.user_id);
        if !self.forward(start, &mut emitted).await {
            return RunSummary {
                outcome: RunOutcome::Disconnected,
                events_emitted: emitted,
            };
        }

        let outcome = 'run: loop {
            match source.next_event().await {
                Some(Ok(raw)) => {
                    for event in classify_event(&raw, &mut self.ctx) {
                        if !self.forward(event, &mut emitted).await {
                            break 'run RunOutcome::Disconnected;
                        }
                    }
                }
                Some(Err(e)) => {
                    error!(session_id = %session_id, "Run source failed: {}", e);
                    let event =
                        WireEvent::error(&session_id, &agent_id, format!("Streaming error: {}", e));
                    self.forward(event, &mut emitted).await;
                    break 'run RunOutcome::Errored;
                }
                None => {
                    let event = WireEvent::complete(
                        &session_id,
                        &agent_id,
                        self.ctx.events_sent(),
                        self.ctx.elapsed_seconds(),
                    );
                    self.forward(event, &mut emitted).await;
                    break 'run RunOutcome::Completed;
                }
            }
        };

        info!(
            session_id = %session_id,
            outcome = ?outcome,
            events = emitted,
            "Run finished"
        );
        RunSummary {
            outcome,
            events_emitted: emitted,
        }
    }

    /// Record and deliver one event; false when the consumer is gone
    async fn forward(&mut self, event: WireEvent, emitted: &mut u64) -> bool {
        if let Some(recorder) = &self.recorder {
            recorder.record(&event).await;
        }
        match self.output_tx.send(event).await {
            Ok(()) => {
                *emitted += 1;
                true
            }
            Err(_) => {
                debug!(session_id = %self.ctx.session_id(), "Consumer disconnected");
                false
            }
        }
    }
}

/// Multiplexes concurrent runs over the session lifecycle manager
///
/// Stores are injected by reference; the relay holds no process-wide
/// state of its own.
pub struct StreamRelay {
    config: RelayConfig,
    store: Arc<dyn SessionStore>,
    memory: Arc<dyn MemoryStore>,
    sessions: Arc<SessionLifecycleManager>,
    active_runs: Arc<AtomicUsize>,
}

impl StreamRelay {
    /// Create a relay over the given stores
    pub fn new(config: RelayConfig, store: Arc<dyn SessionStore>, memory: Arc<dyn MemoryStore>) -> Self {
        let sessions = Arc::new(SessionLifecycleManager::new(
            config.clone(),
            store.clone(),
            memory.clone(),
        ));
        Self {
            config,
            store,
            memory,
            sessions,
            active_runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a relay backed by process-local stores
    pub fn in_memory(config: RelayConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryMemoryStore::new()),
        )
    }

    /// The session lifecycle manager
    pub fn sessions(&self) -> &SessionLifecycleManager {
        &self.sessions
    }

    /// Number of runs currently in flight
    pub fn active_runs(&self) -> usize {
        self.active_runs.load(Ordering::SeqCst)
    }

    /// Start a run in keep-session mode
    ///
    /// Resolves (or reuses) the session for the pair, spawns one task
    /// driving the relay loop, and hands back the bounded receiver of
    /// wire events. Delivered events are recorded into the session
    /// store so teardown can judge the memory flush threshold.
    pub async fn stream<S>(
        &self,
        user_id: &str,
        agent_id: &str,
        source: S,
    ) -> Result<mpsc::Receiver<WireEvent>>
    where
        S: RunEventSource + 'static,
    {
        let handle = self.sessions.resolve(user_id, agent_id).await?;
        self.sessions.touch(user_id, agent_id);

        let (tx, rx) = mpsc::channel(self.config.output_buffer);
        let relay = RelayLoop::new(&handle.session_id, agent_id, user_id, tx)
            .with_recorder(self.store.clone(), &self.config.app_name);

        let gauge = self.active_runs.clone();
        gauge.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let summary = relay.run(source).await;
            gauge.fetch_sub(1, Ordering::SeqCst);
            debug!(
                outcome = ?summary.outcome,
                events = summary.events_emitted,
                "Run task exited"
            );
        });

        Ok(rx)
    }

    /// Run in fire-and-collect mode
    ///
    /// Uses an ephemeral session id, no lifecycle bookkeeping and no
    /// event recording; concatenates the accepted content events into
    /// one response string. A source failure surfaces as an error.
    pub async fn collect<S>(&self, agent_id: &str, source: S) -> Result<String>
    where
        S: RunEventSource + 'static,
    {
        let session_id = uuid::Uuid::new_v4().to_string();
        let (tx, mut rx) = mpsc::channel(self.config.output_buffer);
        let relay = RelayLoop::new(&session_id, agent_id, &self.config.default_user_id, tx);
        let task = tokio::spawn(relay.run(source));

        let mut response = String::new();
        let mut failure = None;
        while let Some(event) = rx.recv().await {
            match event.kind {
                WireEventKind::Content => response.push_str(&event.content),
                WireEventKind::Error => failure = Some(event.content),
                _ => {}
            }
        }
        let _ = task.await;

        match failure {
            Some(message) => Err(Error::Source(message)),
            None => Ok(response),
        }
    }

    /// Search long-term memory for past conversations
    pub async fn search_memory(&self, user_id: &str, query: &str) -> Result<Vec<MemoryHit>> {
        self.memory
            .search(&self.config.app_name, user_id, query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<WireEvent>, mpsc::Receiver<WireEvent>) {
        mpsc::channel(64)
    }

    async fn drain(mut rx: mpsc::Receiver<WireEvent>) -> Vec<WireEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_empty_run_emits_start_and_complete() {
        let (tx, rx) = channel();
        let relay = RelayLoop::new("s1", "a1", "u1", tx);
        let summary = relay.run(ScriptedSource::new(vec![])).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        let events = drain(rx).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, WireEventKind::Start);
        assert_eq!(events[1].kind, WireEventKind::Complete);
        assert_eq!(events[1].metadata["total_events"], 0);
    }

    #[tokio::test]
    async fn test_source_error_emits_single_error_no_complete() {
        let (tx, rx) = channel();
        let relay = RelayLoop::new("s1", "a1", "u1", tx);
        let source = ScriptedSource::failing_after(
            vec![RawRunEvent::text_delta("partial answer")],
            Error::Source("upstream hung up".to_string()),
        );
        let summary = relay.run(source).await;

        assert_eq!(summary.outcome, RunOutcome::Errored);
        let events = drain(rx).await;
        let last = events.last().unwrap();
        assert_eq!(last.kind, WireEventKind::Error);
        assert!(last.content.contains("upstream hung up"));
        assert!(events.iter().all(|e| e.kind != WireEventKind::Complete));
    }

    #[tokio::test]
    async fn test_disconnected_consumer_stops_run() {
        let (tx, rx) = channel();
        drop(rx);

        let relay = RelayLoop::new("s1", "a1", "u1", tx);
        let source = ScriptedSource::new(vec![RawRunEvent::text_delta("never seen")]);
        let summary = relay.run(source).await;

        assert_eq!(summary.outcome, RunOutcome::Disconnected);
        assert_eq!(summary.events_emitted, 0);
    }

    #[tokio::test]
    async fn test_collect_concatenates_content() {
        let relay = StreamRelay::in_memory(RelayConfig::default());
        let source = ScriptedSource::new(vec![
            RawRunEvent::text_delta("Hello"),
            RawRunEvent::text_delta(" world"),
            RawRunEvent::final_text("Hello world"),
        ]);

        let response = relay.collect("helper", source).await.unwrap();
        assert_eq!(response, "Hello world");
        assert_eq!(relay.sessions().live_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_source_adapter() {
        let (tx, rx) = channel();
        let relay = RelayLoop::new("s1", "a1", "u1", tx);
        let source = StreamSource(futures::stream::iter(vec![Ok(RawRunEvent::text_delta(
            "via stream",
        ))]));
        let summary = relay.run(source).await;

        assert_eq!(summary.outcome, RunOutcome::Completed);
        let events = drain(rx).await;
        assert!(events
            .iter()
            .any(|e| e.kind == WireEventKind::Content && e.content == "via stream"));
    }

    #[tokio::test]
    async fn test_collect_surfaces_source_failure() {
        let relay = StreamRelay::in_memory(RelayConfig::default());
        let source = ScriptedSource::failing_after(vec![], Error::Source("boom".to_string()));

        let result = relay.collect("helper", source).await;
        assert!(matches!(result, Err(Error::Source(_))));
    }
}
