//! Domain types for the humanize client.
//!
//! Everything in this crate is pure: request construction and validation,
//! job status projections, the batch item model, style-profile parameter
//! mapping, and export file naming. Network and timer concerns live in
//! `humanize-client` and `humanize-pipeline`.

pub mod batch;
pub mod error;
pub mod export;
pub mod request;
pub mod status;
pub mod style;
pub mod types;
