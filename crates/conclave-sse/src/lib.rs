//! SSE hub (C7): per-branch event fan-out for the Turn engine and HTTP surface.

pub mod event;
pub mod hub;

pub use event::{EventType, SseEvent};
pub use hub::{SseHub, Subscriber};
