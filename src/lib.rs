//! Barcode broadcast relay.
//!
//! See [`relay`] for the bridge between a broadcast source and a
//! single-listener event stream.

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod relay;
