#![deny(missing_docs)]

//! This crate exposes an RFID reader to browsers.
//!
//! Inventory is started and stopped over HTTP,
//! tag reads are streamed over a websocket at `/ws`.

/// Code relating to setting up the server which serves the HTTP routes and websockets.
pub mod server;

/// A client for the tag stream.
pub mod client;

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;

/// Owns the shared state: latest tags, the queue towards subscribers, the subscribers.
pub mod gateway;

/// Handles incoming websockets.
pub(crate) mod websocket;

/// A reader- i.e. something which reads tags and reports them.
pub mod reader;

/// Simulated reader.
pub mod mock;

/// Tags, as reported by readers and as given to users.
pub mod tags;

/// Responses of the HTTP routes.
pub mod responses;
