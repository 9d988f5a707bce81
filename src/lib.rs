//! ClinicalTrials.gov search, detail retrieval and field statistics, exposed
//! as a CLI and as MCP tools over stdio.

pub mod cli;
pub mod config;
pub mod entities;
pub mod error;
pub mod mcp;
pub mod sources;
pub mod transform;
