//! Symbol search over Doxygen search-index data for the C++ standard library
//! reference, served over MCP.
//!
//! [`index::SymbolIndex`] is usable on its own: build it from parsed records
//! and call [`index::SymbolIndex::search`].

pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod literal;
pub mod model;
pub mod parser;
pub mod search;
pub mod server;
pub mod update;
