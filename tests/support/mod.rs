// ABOUTME: Test support utilities.
// ABOUTME: Provides the scripted fake executor for stage tests.

// Each test binary only uses some of these items, so allow dead_code.
#[allow(dead_code)]
pub mod fake_executor;
