// Chart session service - Streaming chart generation with a single fallback
use crate::application::analytics_repository::ChartRepository;
use crate::application::cancel::CancelToken;
use crate::application::error::ApiError;
use crate::domain::chart::{ChartResult, TemplateSummary};
use crate::domain::chat::{ChatTurn, GENERIC_ERROR_TEXT, TurnEvent, TurnLog};
use crate::infrastructure::frame_decoder::{StreamEvent, decode_stream};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

const UPDATE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Sent,
    Streaming,
    Fallback,
    Complete,
    Error,
    Cancelled,
}

/// Snapshot published whenever a session's assistant turn changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUpdate {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub turn: ChatTurn,
}

/// One submitted prompt: its user turn and the event log of its assistant turn.
#[derive(Debug, Clone)]
pub struct ChartSession {
    id: Uuid,
    site_id: String,
    prompt: String,
    parameters: Map<String, Value>,
    user_turn: ChatTurn,
    log: TurnLog,
    phase: SessionPhase,
    fallback_attempted: bool,
}

impl ChartSession {
    fn new(site_id: &str, prompt: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            site_id: site_id.to_string(),
            prompt: prompt.to_string(),
            parameters: Map::new(),
            user_turn: ChatTurn::user(prompt),
            log: TurnLog::new(),
            phase: SessionPhase::Idle,
            fallback_attempted: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Extra chart parameters (e.g. `resolution`) sent along with the prompt
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn fallback_attempted(&self) -> bool {
        self.fallback_attempted
    }

    pub fn user_turn(&self) -> &ChatTurn {
        &self.user_turn
    }

    pub fn assistant_turn(&self) -> ChatTurn {
        self.log.turn()
    }

    pub fn events(&self) -> &[TurnEvent] {
        self.log.events()
    }

    /// Final chart, if the session completed with one
    pub fn result(&self) -> Option<ChartResult> {
        self.assistant_turn().chart
    }

    pub fn update(&self) -> SessionUpdate {
        SessionUpdate {
            session_id: self.id,
            phase: self.phase,
            turn: self.assistant_turn(),
        }
    }

    fn settle(&mut self, event: TurnEvent) {
        self.phase = match &event {
            TurnEvent::Completed(_) => SessionPhase::Complete,
            TurnEvent::Failed(_) => SessionPhase::Error,
            TurnEvent::Progress(_) => self.phase,
        };
        self.log.record(event);
    }
}

#[derive(Clone)]
pub struct ChartSessionService {
    repository: Arc<dyn ChartRepository>,
}

impl ChartSessionService {
    pub fn new(repository: Arc<dyn ChartRepository>) -> Self {
        Self { repository }
    }

    /// Start a session for `prompt`. Blank prompts are ignored.
    pub fn submit(&self, site_id: &str, prompt: &str) -> Option<ChartSession> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }
        Some(ChartSession::new(site_id, prompt))
    }

    /// Run `session` on its own task and stream its snapshots.
    ///
    /// Dropping the receiver cancels the session.
    pub fn spawn(
        &self,
        session: ChartSession,
        cancel: CancelToken,
    ) -> (mpsc::Receiver<SessionUpdate>, JoinHandle<ChartSession>) {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        let closed_tx = tx.clone();
        let watcher_cancel = cancel.clone();
        let watcher = tokio::spawn(async move {
            closed_tx.closed().await;
            watcher_cancel.cancel();
        });

        let service = self.clone();
        let handle = tokio::spawn(async move {
            let session = service.run(session, &cancel, Some(&tx)).await;
            // releases the watcher's sender so the receiver sees end-of-stream
            watcher.abort();
            session
        });

        (rx, handle)
    }

    /// Drive one session to a terminal phase.
    pub async fn run(
        &self,
        mut session: ChartSession,
        cancel: &CancelToken,
        updates: Option<&mpsc::Sender<SessionUpdate>>,
    ) -> ChartSession {
        tracing::info!("Chart session {} started for site {}", session.id, session.site_id);
        session.phase = SessionPhase::Sent;
        publish(updates, &session).await;

        let opened = until_cancelled(
            cancel,
            self.repository
                .open_chart_stream(&session.site_id, &session.prompt, &session.parameters),
        )
        .await;

        let body = match opened {
            None => return cancelled(session),
            Some(Ok(Some(body))) => body,
            Some(Ok(None)) => {
                tracing::warn!("Chart session {}: stream has no body", session.id);
                return self.fall_back(session, cancel, updates).await;
            }
            Some(Err(e)) => {
                tracing::warn!("Chart session {}: failed to open stream: {}", session.id, e);
                return self.fall_back(session, cancel, updates).await;
            }
        };

        session.phase = SessionPhase::Streaming;
        let events = decode_stream(body);
        futures::pin_mut!(events);

        loop {
            let next = match until_cancelled(cancel, events.next()).await {
                None => return cancelled(session),
                Some(next) => next,
            };

            match next {
                Some(Ok(event)) => {
                    tracing::debug!("Chart session {}: {:?}", session.id, event);
                    let event = match event {
                        StreamEvent::Progress { message } => TurnEvent::Progress(message),
                        StreamEvent::Complete { result } => TurnEvent::Completed(result),
                        StreamEvent::Error { message } => TurnEvent::Failed(message),
                    };
                    let terminal = event.is_terminal();
                    session.settle(event);
                    publish(updates, &session).await;

                    if terminal {
                        tracing::info!(
                            "Chart session {} finished: {:?}",
                            session.id,
                            session.phase
                        );
                        return session;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("Chart session {}: stream read failed: {}", session.id, e);
                    return self.fall_back(session, cancel, updates).await;
                }
                None => {
                    tracing::warn!(
                        "Chart session {}: stream ended without a result",
                        session.id
                    );
                    return self.fall_back(session, cancel, updates).await;
                }
            }
        }
    }

    /// One non-streaming attempt with the same prompt. Never retried.
    async fn fall_back(
        &self,
        mut session: ChartSession,
        cancel: &CancelToken,
        updates: Option<&mpsc::Sender<SessionUpdate>>,
    ) -> ChartSession {
        session.fallback_attempted = true;
        session.phase = SessionPhase::Fallback;
        publish(updates, &session).await;

        let outcome = until_cancelled(
            cancel,
            self.repository
                .generate_chart(&session.site_id, &session.prompt, &session.parameters),
        )
        .await;

        match outcome {
            None => return cancelled(session),
            Some(Ok(result)) => session.settle(TurnEvent::Completed(result)),
            Some(Err(e)) => {
                tracing::error!("Chart session {}: fallback failed: {}", session.id, e);
                session.settle(TurnEvent::Failed(GENERIC_ERROR_TEXT.to_string()));
            }
        }

        publish(updates, &session).await;
        tracing::info!("Chart session {} finished via fallback: {:?}", session.id, session.phase);
        session
    }

    /// Generate a chart from a saved template in a single call.
    pub async fn select_template(
        &self,
        site_id: &str,
        template_id: &str,
        parameters: &Map<String, Value>,
    ) -> ChartSession {
        let mut session = ChartSession::new(site_id, template_id);
        session.phase = SessionPhase::Sent;

        match self
            .repository
            .chart_from_template(site_id, template_id, parameters)
            .await
        {
            Ok(result) => session.settle(TurnEvent::Completed(result)),
            Err(e) => {
                tracing::error!("Template {} failed for site {}: {}", template_id, site_id, e);
                session.settle(TurnEvent::Failed(GENERIC_ERROR_TEXT.to_string()));
            }
        }
        session
    }

    pub async fn list_templates(&self, site_id: &str) -> Result<Vec<TemplateSummary>, ApiError> {
        self.repository.list_templates(site_id).await
    }
}

async fn until_cancelled<F: Future>(cancel: &CancelToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = future => Some(output),
    }
}

fn cancelled(mut session: ChartSession) -> ChartSession {
    tracing::info!("Chart session {} cancelled", session.id);
    session.phase = SessionPhase::Cancelled;
    session
}

async fn publish(updates: Option<&mpsc::Sender<SessionUpdate>>, session: &ChartSession) {
    if let Some(tx) = updates {
        let _ = tx.send(session.update()).await;
    }
}
