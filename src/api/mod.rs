//! HTTP and WebSocket surface of the board server.

pub mod auth;
pub mod board;
pub mod routes;
pub mod types;
pub mod ws;
