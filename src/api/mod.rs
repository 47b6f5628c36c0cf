//! HTTP API Module
//! Mission: Assemble the public, auth, and protected route surfaces

pub mod routes;

pub use routes::build_router;
