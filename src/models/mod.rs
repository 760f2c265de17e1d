pub mod chat;
pub mod options;
pub mod websocket;
