//! HTTP interface module.

pub mod handlers;
pub mod identity;
pub mod routes;
