//! Shared building blocks for the Fundboard backend services: records,
//! roles and permissions, the store and identity-provider seams, and the
//! HTTP plumbing every service mounts.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod i18n;
pub mod identity;
pub mod models;
pub mod permissions;
pub mod store;

#[cfg(feature = "test_utils")]
pub mod test_utils;
