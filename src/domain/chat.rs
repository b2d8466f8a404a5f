// Chat turns and the per-turn event log they are folded from
use super::chart::ChartResult;
use serde::Serialize;
use uuid::Uuid;

pub const PENDING_TEXT: &str = "Generating chart...";
pub const DEFAULT_COMPLETE_TEXT: &str = "Here's the chart you asked for.";
pub const GENERIC_ERROR_TEXT: &str =
    "Sorry, I encountered an error generating that chart. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub is_loading: bool,
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartResult>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            text: text.into(),
            is_loading: false,
            is_error: false,
            chart: None,
        }
    }

    fn placeholder(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Assistant,
            text: PENDING_TEXT.to_string(),
            is_loading: true,
            is_error: false,
            chart: None,
        }
    }
}

/// Something that happened to an assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Progress(String),
    Completed(ChartResult),
    Failed(String),
}

impl TurnEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TurnEvent::Progress(_))
    }
}

/// Append-only history of one assistant turn.
///
/// The visible turn is always `fold(events)`; nothing is recorded after a
/// terminal event.
#[derive(Debug, Clone)]
pub struct TurnLog {
    turn_id: Uuid,
    events: Vec<TurnEvent>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            events: Vec::new(),
        }
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    pub fn events(&self) -> &[TurnEvent] {
        &self.events
    }

    pub fn is_finalized(&self) -> bool {
        self.events.last().is_some_and(TurnEvent::is_terminal)
    }

    /// Append an event. Returns `false` (and drops it) once the turn is final.
    pub fn record(&mut self, event: TurnEvent) -> bool {
        if self.is_finalized() {
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn turn(&self) -> ChatTurn {
        self.events
            .iter()
            .fold(ChatTurn::placeholder(self.turn_id), apply)
    }
}

impl Default for TurnLog {
    fn default() -> Self {
        Self::new()
    }
}

fn apply(mut turn: ChatTurn, event: &TurnEvent) -> ChatTurn {
    if !turn.is_loading {
        return turn;
    }

    match event {
        TurnEvent::Progress(message) => {
            turn.text = message.clone();
        }
        TurnEvent::Completed(result) => {
            turn.is_loading = false;
            turn.text = if result.message.is_empty() {
                DEFAULT_COMPLETE_TEXT.to_string()
            } else {
                result.message.clone()
            };
            turn.chart = Some(result.clone());
        }
        TurnEvent::Failed(message) => {
            turn.is_loading = false;
            turn.is_error = true;
            turn.text = if message.is_empty() {
                GENERIC_ERROR_TEXT.to_string()
            } else {
                message.clone()
            };
        }
    }
    turn
}
