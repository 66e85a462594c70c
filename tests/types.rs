// ABOUTME: Tests for the application-name newtype.
// ABOUTME: Validation rules plus a property check over derived names.

use apostoli::types::{AppName, AppNameError};
use proptest::prelude::*;

/// Test: valid RFC 1123 labels pass through unchanged.
#[test]
fn valid_names_are_accepted() {
    for name in ["demo", "demo-app", "a", "app2", "0day"] {
        let parsed = AppName::new(name).unwrap();
        assert_eq!(parsed.as_str(), name);
    }
}

/// Test: each rejection names the violated rule.
#[test]
fn invalid_names_are_rejected_with_the_right_reason() {
    assert!(matches!(AppName::new(""), Err(AppNameError::Empty)));
    assert!(matches!(
        AppName::new("-demo"),
        Err(AppNameError::StartsWithHyphen)
    ));
    assert!(matches!(
        AppName::new("demo-"),
        Err(AppNameError::EndsWithHyphen)
    ));
    assert!(matches!(
        AppName::new("Demo"),
        Err(AppNameError::InvalidChar('D'))
    ));
    assert!(matches!(
        AppName::new("demo app"),
        Err(AppNameError::InvalidChar(' '))
    ));
    assert!(matches!(
        AppName::new(&"a".repeat(64)),
        Err(AppNameError::TooLong)
    ));
}

/// Test: derivation normalizes case, separators, and the .git suffix.
#[test]
fn derivation_normalizes_urls() {
    let cases = [
        ("https://github.com/acme/My.Cool_App.git", "my-cool-app"),
        ("https://github.com/acme/demo", "demo"),
        ("https://github.com/acme/demo/", "demo"),
        ("git@github.com:acme/Widget.git", "widget"),
    ];
    for (url, expected) in cases {
        assert_eq!(AppName::derive(url).unwrap().as_str(), expected);
    }
}

/// Test: over-long segments are truncated to a valid label length.
#[test]
fn long_segments_are_truncated() {
    let url = format!("https://github.com/acme/{}.git", "x".repeat(100));
    let name = AppName::derive(&url).unwrap();
    assert_eq!(name.as_str().len(), 63);
}

proptest! {
    /// Whatever URL derivation accepts, the result is a valid label:
    /// safe as a container name, a filename, and a directory name.
    #[test]
    fn derived_names_are_always_valid(url in "[a-zA-Z0-9._/:@-]{1,80}") {
        if let Ok(name) = AppName::derive(&url) {
            prop_assert!(AppName::new(name.as_str()).is_ok());
            prop_assert!(name.as_str().len() <= 63);
            prop_assert!(!name.as_str().contains('/'));
        }
    }

    /// Derivation is a pure function of the URL.
    #[test]
    fn derivation_is_stable(url in "[a-z0-9./:-]{1,60}") {
        let first = AppName::derive(&url).ok();
        let second = AppName::derive(&url).ok();
        prop_assert_eq!(first, second);
    }
}
