//! Library crate for recon-probe-rs: bounded-concurrency host discovery and
//! HTTP injection probing.
//!
//! Candidates are enumerated lazily ([`enumerate`]), executed by a [`probe::Probe`]
//! under a worker budget ([`scanner`]), classified ([`classify`]) and collected
//! into a [`types::ScanReport`]. [`engine`] wires these together per mode.
pub mod classify;
pub mod config;
pub mod engine;
pub mod enumerate;
pub mod netdetect;
pub mod payloads;
pub mod ports;
pub mod probe;
pub mod report;
pub mod scanner;
pub mod types;
