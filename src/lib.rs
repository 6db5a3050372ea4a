//! Solana bridge saver - Library interface
//!
//! Re-exports internal modules for use in integration tests.

pub mod broadcaster;
pub mod catchup;
pub mod chain;
pub mod config;
pub mod error;
pub mod hash;
pub mod instruction;
pub mod listener;
pub mod metadata;
pub mod operators;
pub mod processor;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod types;
pub mod verifier;
pub mod voter;
