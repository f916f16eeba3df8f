//! geo-db: geographic facts from a knowledge-base dump
//!
//! Streams a compressed entity dump and extracts into a relational store:
//! - countries with their ISO codes
//! - territorial entities with their parents and official languages
//! - human settlements with country, population, coordinates and names
//! - languages with their codes
//!
//! Facts carrying start/end time qualifiers are only kept while they hold
//! at a fixed reference instant.

pub mod classify;
pub mod config;
pub mod entity;
pub mod extract;
pub mod import;
pub mod sink;
pub mod taxonomy;
pub mod temporal;
pub mod vocab;

pub use config::Config;
