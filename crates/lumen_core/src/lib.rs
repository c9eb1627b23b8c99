//! Core types shared by every Lumen crate: the error enum and frame timing.

pub mod errors;
pub mod time;

pub use errors::{LumenError, Result};
pub use time::Timer;
