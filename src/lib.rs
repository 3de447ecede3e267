//! Test harness crate for commandflow's cross-crate integration,
//! concurrency, and property-style tests (see `tests/`).
//!
//! This crate exposes no public API of its own — it exists only to give
//! `tests/` a package to hang off of, pulling every `commandflow-*` crate
//! in as a dev-surface dependency (see the workspace root `Cargo.toml`).
