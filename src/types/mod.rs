// ABOUTME: Validated newtypes shared across the crate.
// ABOUTME: Prevents raw strings from crossing module boundaries.

mod app_name;

pub use app_name::{AppName, AppNameError};
