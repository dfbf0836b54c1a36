// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn keeps_everything_under_the_limit() {
    let mut tail = OutputTail::new(16);
    tail.push("hello ");
    tail.push("world");
    assert_eq!(tail.as_str(), "hello world");
}

#[test]
fn drops_the_oldest_bytes() {
    let mut tail = OutputTail::new(8);
    tail.push("0123456789");
    assert_eq!(tail.as_str(), "23456789");
    tail.push("ab");
    assert_eq!(tail.as_str(), "456789ab");
}

#[test]
fn trimming_respects_char_boundaries() {
    let mut tail = OutputTail::new(5);
    // "é" is two bytes; a cut at byte 1 would split it
    tail.push("éabcd");
    tail.push("e");
    assert_eq!(tail.as_str(), "abcde");
    assert!(tail.len() <= 5);
}

#[test]
fn last_returns_a_suffix() {
    let mut tail = OutputTail::new(100);
    tail.push("line one\nline two\n");
    assert_eq!(tail.last(9), "line two\n");
    assert_eq!(tail.last(1000), "line one\nline two\n");
}

#[test]
fn last_never_splits_a_character() {
    let mut tail = OutputTail::new(100);
    tail.push("✓ done");
    // '✓' is three bytes; asking for 7 would start inside it
    assert_eq!(tail.last(7), " done");
}
