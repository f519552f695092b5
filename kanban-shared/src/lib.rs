//! # Kanban Shared Library
//!
//! Domain types, persistence and access policy for the kanban backend.
//!
//! ## Module Organization
//!
//! - `auth`: authentication plus the board-scoped authorization Gate
//! - `db`: connection pool and migrations
//! - `models`: users, boards, memberships, tasks and comments

pub mod auth;
pub mod db;
pub mod models;

/// Current version of the kanban shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
