//! Network subsystem: TCP transport to the SDR server

pub mod session;

pub use session::{Session, TICK_PERIOD};
