//! Client stream: wire protocol and WebSocket session handling

pub mod handler;
pub mod protocol;
