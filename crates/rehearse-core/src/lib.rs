//! rehearse-core - Core library for Rehearse
//!
//! Authentication against Supabase, typed table and storage clients, and the
//! practice flows (recording, history, tailored questions) every Rehearse
//! interface drives. Remote services sit behind traits so the flows can be
//! exercised without a network.

pub mod auth;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod guard;
pub mod history;
pub mod models;
pub mod recording;
pub mod remote;
pub mod tailored;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorCategory, Result};
