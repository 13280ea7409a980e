//! Cereal archives Granola meeting transcripts into a searchable SQLite
//! knowledge base, organized by client.
//!
//! The library owns the archive pipeline (cache reader, client detection,
//! storage) plus the response formatting shared by the MCP surface; the
//! server itself lives in `bin/mcp.rs`.

pub mod archive;
pub mod config;
pub mod db;
pub mod detect;
pub mod format;
pub mod granola;
mod migrations;
pub mod util;
