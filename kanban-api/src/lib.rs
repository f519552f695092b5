//! # Kanban API Server Library
//!
//! HTTP surface of the kanban backend: boards, tasks and comments behind
//! bearer authentication, plus the public account endpoints.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from the environment
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Response security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
