//! Client-side synchronization core for the chat backend: REST snapshot
//! loading, realtime stream reconciliation and optimistic local sends.

pub mod config;
pub mod controller;
pub mod conversation;
pub mod directory;
pub mod rest;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use controller::{ChatController, SelectionTicket};
pub use conversation::ConversationStore;
pub use directory::ContactDirectory;
pub use rest::ApiClient;
pub use session::{ConnectionState, RealtimeSession, SessionError, SessionEvent};
pub use transport::{InboundFrame, StreamTransport, TransportLink, WebSocketTransport};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
