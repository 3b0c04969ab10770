//! Agricultural declaration intake: record store, step validation, and the
//! multi-step wizard that drives a declaration from welcome screen to submission.

pub mod config;
pub mod declarations;
pub mod error;
pub mod telemetry;
