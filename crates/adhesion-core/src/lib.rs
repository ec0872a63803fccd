//! Core types and workflows for the Adhesion membership engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement [`store::MembershipStore`]; the workflows
//! ([`registry::MemberRegistry`], [`dues::DuesWorkflow`],
//! [`reports::FieldReportWorkflow`]) are generic over it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cotisation;
pub mod currency;
pub mod dues;
pub mod election;
pub mod error;
pub mod identity;
pub mod instructions;
pub mod member;
pub mod registry;
pub mod reports;
pub mod store;

pub use error::{Error, Result};
