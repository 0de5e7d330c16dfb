//! Shared types for the superchat backend.
//!
//! `models` holds the domain records every crate agrees on; `api` holds the
//! request and response bodies of the HTTP surface.

pub mod api;
pub mod models;
