//! twinbridge Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain** - `ErrorFlags`/`ErrorClassifier`, `TelemetrySample`, `ErrorEvent`, node addressing
//! - **Ports** - Traits for external collaborators: `INodeClient`, `ITwinService`,
//!   `IAlertGateway`, `IDeviceRegistry`
//! - **Use cases** - Cloud-side rules reacting to aggregated production messages
//! - **Configuration** - YAML-backed settings with validation
//!
//! # Architecture
//!
//! The domain module is pure and performs no I/O. Ports define the trait
//! interfaces that adapter crates implement; the synchronization engine in
//! `twinbridge-sync` drives devices through them.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
