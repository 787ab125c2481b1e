//! Handlers for the public search API.

pub mod search;
