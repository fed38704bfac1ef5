//! sheetsync: spreadsheet worksheets into a relational store
//!
//! Worksheets are read into [`table::Table`]s, sanitized and bulk-loaded by
//! [`load::BulkLoader`] through an [`db::Executor`], then the
//! [`pipeline::Pipeline`] runs counts, checks and summaries over the loaded
//! tables.

pub mod cli;
pub mod config;
pub mod db;
pub mod load;
pub mod pipeline;
pub mod source;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;
