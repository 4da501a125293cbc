//! setwise: an active workout session engine with a command-line front end.
//!
//! The library half holds the engine ([`engine`]), its persistence seams
//! ([`store`]) and the SQLite backend; the binary wires them to
//! [`cli`] and [`commands`].

pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod store;
pub mod types;
pub mod utils;
