pub mod anilist;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fetch_log;
pub mod output;
pub mod queue;
pub mod runtime;
pub mod state;
pub mod store;
pub mod tui;
