//! Fuzzy multilingual place-name resolution over GeoNames data.
//!
//! GeoNames dumps are bulk-loaded into a relational store ([`loader`],
//! [`store`]); populous cities are joined with their region labels and
//! indexed by multilingual sentence embeddings ([`semantic`]) so that a
//! misspelled or foreign-script city name resolves to ranked candidates.

pub mod app;
pub mod config;
pub mod loader;
pub mod semantic;
pub mod store;

#[cfg(test)]
mod tests;
