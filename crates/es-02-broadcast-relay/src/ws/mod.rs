//! WebSocket connection lifecycle.

pub mod handler;

pub use handler::{handle_socket, inspect_inbound, Inbound};
