//! # roomchat
//!
//! Terminal room chat over STOMP on a WebSocket transport.
//!
//! The crate is a thin client layer: [`chat::Chat`] owns the connection
//! lifecycle, the room subscription, publishing and the message log;
//! [`net`] runs the STOMP session on its own task and hands events back over
//! a typed channel; [`app`] and [`view`] drive and render the terminal UI.
//! Frame encoding lives in the `frames` crate.

pub mod app;
pub mod chat;
pub mod config;
pub mod destination;
pub mod net;
pub mod state;
pub mod view;
