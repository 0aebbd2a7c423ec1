//! Fuzz target for post composition.
//!
//! The composed body must preserve both parts byte-for-byte regardless of
//! what the topic label or message content contain.

#![no_main]

use libfuzzer_sys::fuzz_target;
use thread_mirror::compose_post;

fuzz_target!(|data: (&str, &str)| {
    let (topic, content) = data;

    // Should never panic
    let post = compose_post(topic, content);

    assert_eq!(post.len(), topic.len() + 1 + content.len());
    assert!(post.starts_with(topic));
    assert!(post.ends_with(content));
    assert_eq!(post.as_bytes()[topic.len()], b'\n');
});
