//! Integration tests spanning the race crates live under `tests/`.
//! This crate intentionally has no library code.
