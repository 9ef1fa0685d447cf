// Copyright 2026 Replica Contributors
// SPDX-License-Identifier: Apache-2.0

//! Replica runtime library: CLI commands, REST API, Chromium renderer and
//! the capture worker.
//!
//! This library crate exposes the modules for integration testing.

pub mod cli;
pub mod logging;
pub mod renderer;
pub mod rest;
