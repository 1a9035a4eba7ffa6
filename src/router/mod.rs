//! HTTP front end: request routing, admin endpoints, and server bootstrap.

pub mod handlers;
pub mod server;

pub use server::{AppState, LbServer};
