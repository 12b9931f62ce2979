//! Wire protocol shared by the obsws client and the loopback server.
//!
//! Frames are JSON text objects of the form `{"op": <u8>, "d": <payload>}`. The
//! payload shapes live in [`protocol`]; the challenge-response proof used during
//! the handshake lives in [`auth`].

pub mod auth;
pub mod constants;
pub mod protocol;
