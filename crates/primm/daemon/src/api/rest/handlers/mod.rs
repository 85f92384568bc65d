//! REST API handlers

mod health;
mod progress;
mod submissions;

pub use health::*;
pub use progress::*;
pub use submissions::*;
