//! Authentication subsystem.
//!
//! Decodes HTTP Basic credentials, verifies them against the in-memory
//! [`credentials::CredentialStore`], and decides between accepting a request
//! and re-challenging it.

pub mod basic;
pub mod credentials;
pub mod gate;
