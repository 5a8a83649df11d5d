//! Vendor-agnostic market data models and the providers that fill them.
//!
//! [`models`] holds the canonical bar and option-contract types; [`providers`]
//! defines the async provider traits and the Alpaca REST implementation.

pub mod models;
pub mod providers;
