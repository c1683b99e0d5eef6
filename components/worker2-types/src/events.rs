mod error_event;
mod error_event_kind;
mod message_event;

pub use self::{
    error_event::ErrorEvent, error_event_kind::ErrorEventKind, message_event::MessageEvent,
};
