//! Intake Engine — guided, turn-based interview core.

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod llm;
pub mod schema;
pub mod score;
pub mod select;
pub mod session;
pub mod shape;
pub mod store;
