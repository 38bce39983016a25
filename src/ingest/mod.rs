//! Inbound event handling
//!
//! Transport-neutral events, the dispatcher that applies them to the
//! caches, and the collaborator traits it talks to.

/// Authorization policies.
pub mod access;
/// Chat commands and reply texts.
pub mod commands;
/// Permission-denied reply throttling.
pub mod denials;
/// Event dispatcher and collaborator traits.
pub mod dispatcher;
/// Inbound event types.
pub mod event;

pub use access::{AccessPolicy, AllowAll, AllowList};
pub use commands::Command;
pub use denials::DenialThrottle;
pub use dispatcher::{
    Collaborators, ContentSource, DispatchError, DispatchOutcome, EventDispatcher, FetchError,
    ReplySender,
};
pub use event::{EventSource, InboundEvent, MediaRef, MessageContent};
