#![forbid(unsafe_code)]

pub mod access;
pub mod error;
pub mod model;
pub mod time;

pub use access::{AccessDecision, AccessReason, evaluate, evaluate_for_role};
pub use error::Error;
pub use time::Clock;
