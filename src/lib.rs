//! archivist: track parsed documents locally, reconcile them against a
//! remote archive, and project their embedded chunks into a vector index.

pub mod chunk;
pub mod commands;
pub mod config;
pub mod controller;
pub mod embed;
pub mod error;
pub mod events;
pub mod models;
pub mod progress;
pub mod remote;
pub mod sync;
pub mod validate;
pub mod vector;
