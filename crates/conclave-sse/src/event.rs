//! The SSE wire format (§6.1): `data: <TYPE>\n<PAYLOAD>\n\n`, with
//! multi-line payloads split over additional `data:` lines.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    WorkspaceHint,
    InitialStateActive,
    InitialStateIdle,
    Ack,
    Thought,
    ModelText,
    FunctionCall,
    FunctionResponse,
    InlineData,
    CumulTokenCount,
    PendingConfirmation,
    GenerationChanged,
    SessionName,
    Complete,
    Ping,
    Error,
}

impl EventType {
    pub fn as_char(self) -> char {
        match self {
            EventType::WorkspaceHint => 'W',
            EventType::InitialStateActive => '0',
            EventType::InitialStateIdle => '1',
            EventType::Ack => 'A',
            EventType::Thought => 'T',
            EventType::ModelText => 'M',
            EventType::FunctionCall => 'F',
            EventType::FunctionResponse => 'R',
            EventType::InlineData => 'I',
            EventType::CumulTokenCount => 'C',
            EventType::PendingConfirmation => 'P',
            EventType::GenerationChanged => 'G',
            EventType::SessionName => 'N',
            EventType::Complete => 'Q',
            EventType::Ping => '.',
            EventType::Error => 'E',
        }
    }

    /// Whether this event type is terminal for the current turn's stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventType::Complete | EventType::PendingConfirmation | EventType::Error)
    }
}

#[derive(Debug, Clone)]
pub struct SseEvent {
    pub ty: EventType,
    pub payload: String,
}

impl SseEvent {
    pub fn new(ty: EventType, payload: impl Into<String>) -> Self {
        Self { ty, payload: payload.into() }
    }

    pub fn empty(ty: EventType) -> Self {
        Self::new(ty, String::new())
    }

    pub fn ping() -> Self {
        Self::empty(EventType::Ping)
    }

    /// Render as the raw bytes to write to an SSE response body.
    pub fn to_wire(&self) -> String {
        let mut out = format!("data: {}\n", self.ty.as_char());
        for line in self.payload.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

impl fmt::Display for SseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_payload_round_trips() {
        let event = SseEvent::new(EventType::Ack, "42");
        assert_eq!(event.to_wire(), "data: A\ndata: 42\n\n");
    }

    #[test]
    fn multi_line_payload_splits_across_data_lines() {
        let event = SseEvent::new(EventType::ModelText, "123\nhello world");
        assert_eq!(event.to_wire(), "data: M\ndata: 123\ndata: hello world\n\n");
    }

    #[test]
    fn empty_payload_events_still_terminate() {
        let event = SseEvent::empty(EventType::Complete);
        assert_eq!(event.to_wire(), "data: Q\ndata: \n\n");
    }
}
