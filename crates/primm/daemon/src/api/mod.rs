//! API layer for primm-daemon

pub mod rest;

pub use rest::router::create_router;
