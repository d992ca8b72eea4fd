//! Top-level route handlers

pub mod health;
