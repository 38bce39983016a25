/// Telegram runtime entrypoint
pub mod runner;
/// Telegram implementations of the dispatcher collaborators
pub mod transport;

pub use runner::run_bot;
pub use transport::{event_from_message, TelegramContentSource, TelegramReplySender};
