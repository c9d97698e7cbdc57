//! HTTP API

mod health;
mod router;
mod video;

pub use router::create_router;
