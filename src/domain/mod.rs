//! Pure connection logic: no device I/O lives here.

pub mod errors;
pub mod models;
pub mod pairing;
pub mod settings;
pub mod status;
pub mod steps;
pub mod wizard;
