//! pcnmap: front end for the PCN error map
//!
//! - `config`: command line and resolved run configuration
//! - `ingest`: org-table dumps into the aggregator
//! - `input_gen`: seeded synthetic error streams
//! - `report`: text and JSON rendering of an aggregate

pub mod config;
pub mod ingest;
pub mod input_gen;
pub mod report;
