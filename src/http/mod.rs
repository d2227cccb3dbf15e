//! HTTP surface: health, state, and unary game actions

pub mod routes;

pub use routes::{build_router, AppError};
