// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The outer build loop: given a graph of actions, decides for each one whether a cache hit
//! satisfies it, and if not, dispatches it locally or remotely, harvests its dynamic
//! dependencies, and schedules a cache write in the background. Everything else in this
//! workspace is a library this crate assembles.

mod config;
mod engine;
mod error;
mod graph;

pub use config::{CacheMode, EngineConfig};
pub use engine::{BuildOutcome, Engine};
pub use error::{Error, MissingOutput};
pub use graph::{testing, BuildGraph, StaticDependency};
