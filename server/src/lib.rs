//! Loopback obs-websocket server.
//!
//! Speaks the server half of the hello/identify handshake (including password
//! authentication), answers a handful of request types, and broadcasts events.
//! Used to exercise the client end to end and runnable on its own.

mod accept_loop;
mod connection;
mod error;
mod handlers;
mod state;

pub use accept_loop::{run, run_until};
pub use connection::close_code;
pub use error::ServerError;
pub use handlers::AVAILABLE_REQUESTS;
pub use state::{ServerConfig, ServerState};
