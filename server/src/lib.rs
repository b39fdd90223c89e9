//! Murmur relay library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod relay;
pub mod routes;
pub mod state;
pub mod ws;
