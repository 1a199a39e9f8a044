//! LedgerLink Client
//!
//! Gateway for applications: enrolls the admin and user identities (reusing
//! cached ones), joins the configured channel and runs chaincode invokes and
//! queries as the user.

pub mod client;
pub mod config;

pub use client::{LedgerClient, LedgerClientBuilder};
pub use config::ClientConfig;
