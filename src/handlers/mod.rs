//! HTTP handlers for the LBF Operator

mod health;

pub use health::*;
