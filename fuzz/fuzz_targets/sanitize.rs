//! Arbitrary text against the message validator and sanitizer
//!
//! Sanitizing never fails, stays within the length limit, and is stable:
//! cleaning clean text changes nothing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tandem_core::validator::{
    MAX_MESSAGE_LENGTH, is_valid_message, sanitize_message, validate_emoji, validate_message,
};

fuzz_target!(|text: &str| {
    let valid = validate_message(Some(text)).is_ok();
    assert_eq!(valid, is_valid_message(text));

    let clean = sanitize_message(text);

    // INVARIANT 1: output fits the limit and carries no outer whitespace
    assert!(clean.chars().count() <= MAX_MESSAGE_LENGTH);
    assert_eq!(clean.trim(), clean);

    // INVARIANT 2: idempotent
    assert_eq!(sanitize_message(&clean), clean);

    // INVARIANT 3: accepted text only loses its outer whitespace
    if valid {
        assert_eq!(clean, text.trim());
    }

    let _ = validate_emoji(text);
});
