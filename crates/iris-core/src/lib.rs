//! Configuration loading and construction of the embedder, generator and
//! query engine from it.

pub mod bootstrap;
pub mod config;

pub use config::Config;
