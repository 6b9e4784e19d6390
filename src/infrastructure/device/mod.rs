//! Device Module
//!
//! Drives the physical devices through the connection wizard: flashing over
//! USB, then connecting over the wireless link or the radio bridge.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   ConnectionService                      │
//! │   (wizard + status; public API for the application)      │
//! └───────┬──────────────────┬──────────────────┬───────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Flashing    │   │  Watchdog    │   │  Transport   │
//! │              │   │              │   │              │
//! │ - firmware   │   │ - handshake  │   │ - USB        │
//! │   table      │   │   timer      │   │ - wireless   │
//! │ - error      │   │ - liveness   │   │ - radio      │
//! │   mapping    │   │   timer      │   │   links      │
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`transport`] - Driver traits and their structured errors
//! - [`listeners`] - One status listener per device kind
//! - [`firmware`] - Firmware table and image loading
//! - [`flashing`] - USB flashing and failure classification
//! - [`watchdog`] - Connection attempt timers
//! - [`service`] - Main service coordinator
//! - [`simulated`] - In-memory driver for the demo and tests

pub mod firmware;
pub mod flashing;
pub mod listeners;
pub mod service;
pub mod simulated;
pub mod transport;
pub mod watchdog;

// Re-export main service for convenience
pub use service::ConnectionService;
