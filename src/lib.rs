//! Claims-based authorization core with cached per-user permission
//! snapshots, role augmentation middleware, and a permission catalog,
//! embedded in a small demo host.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod session;
pub mod state;
