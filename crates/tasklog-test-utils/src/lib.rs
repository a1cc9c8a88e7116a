// SPDX-FileCopyrightText: 2026 Tasklog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for task-log integration tests.
//!
//! Provides a [`TestHarness`] backed by a temporary on-disk database, with
//! helpers to seed control-plane rows, drain the log as the consumer would,
//! and inject store-level failures.

pub mod harness;

pub use harness::{TestHarness, TestHarnessBuilder};
