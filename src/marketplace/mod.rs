//! Marketplace integration: the REST seam, token lifecycle, account/policy
//! resolution, and the offer publish pipeline.

pub mod api;
pub mod error;
pub mod inventory;
pub mod offer_builder;
pub mod offer_lifecycle;
pub mod policy;
pub mod token;
pub mod types;

#[cfg(test)]
pub(crate) mod testkit;
