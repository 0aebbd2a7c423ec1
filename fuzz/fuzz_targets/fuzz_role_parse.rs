//! Fuzz target for role tag parsing.
//!
//! Role tags come straight out of the database, so parsing must never
//! panic on arbitrary input and must only accept the known tags.

#![no_main]

use libfuzzer_sys::fuzz_target;
use thread_mirror::store::Role;

fuzz_target!(|tag: &str| {
    // Should never panic
    let parsed = Role::parse(tag);

    // Only the canonical tags parse, and they round-trip
    if let Some(role) = parsed {
        assert!(matches!(tag, "system" | "human" | "ai"));
        assert_eq!(role.as_str(), tag);
        assert_eq!(Role::parse(role.as_str()), Some(role));
    }
});
