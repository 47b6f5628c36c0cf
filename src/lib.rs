//! Chatline Backend Library
//!
//! Exposes the auth core and router assembly for the binary and the
//! integration tests.

pub mod api;
pub mod auth;
pub mod config;
