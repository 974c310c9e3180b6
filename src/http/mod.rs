//! HTTP layer.
//!
//! Every path answers `GET` with the caller's policy document once Basic
//! credentials check out, or with a 401 challenge otherwise.  Metrics live on
//! a separate router so they never shadow a policy path.

pub mod handler;
