//! HTTP handlers

pub mod auth;
pub mod check;
pub mod health;
pub mod roles;
pub mod users;
