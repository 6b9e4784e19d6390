//! Device connection and flashing for the sensor pairing wizard.
//!
//! [`domain`] holds the pure pieces: the pairing codec, the status classifier
//! and the wizard flow. [`infrastructure`] talks to devices and wires them
//! together in [`infrastructure::device::ConnectionService`].

pub mod domain;
pub mod infrastructure;
