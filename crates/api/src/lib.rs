//! HTTP surface: router assembly, bearer auth, and the cart handlers.

pub mod app;
pub mod context;
pub mod middleware;
