//! quickpoll library
//!
//! Multiple-choice polls over HTTP with one vote per voter address.
//! The poll engine sits on a pluggable store; the SQLite store enforces
//! vote uniqueness in the schema, so concurrent requests cannot double-vote.

pub mod cli;
pub mod config;
pub mod logging;
pub mod migrations;
pub mod polls;
pub mod server;
