// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use action_cache::CompressionKind;
use dispatch::DistributionMode;
use process_runner::{CaptureMode, ProgressSink};

/// Whether the action cache may be read from, written to, both, or neither. Distinct from
/// `ALLOW_CACHEREAD`/`ALLOW_CACHEWRITE` on an individual action: both gates must agree before
/// a read or write actually happens.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheMode {
    ReadWrite,
    ReadOnly,
    Disabled,
}

impl CacheMode {
    pub fn allows_read(&self) -> bool {
        matches!(self, CacheMode::ReadWrite | CacheMode::ReadOnly)
    }

    pub fn allows_write(&self) -> bool {
        matches!(self, CacheMode::ReadWrite)
    }
}

/// Everything the engine needs that isn't specific to one action: constructed once by the
/// caller and passed by reference or cloned into constructors, never mutated globally after
/// startup (per the "no global mutable configuration" rule).
#[derive(Clone)]
pub struct EngineConfig {
    pub cache_root: PathBuf,
    pub compression: CompressionKind,
    pub cache_mode: CacheMode,
    pub local_pool_size: usize,
    pub distribution_mode: DistributionMode,
    pub response_file_threshold_bytes: usize,
    /// Whether a locally-run action's output is buffered (surfaced only on failure) or streamed
    /// line-by-line to `progress_sink` as it runs.
    pub capture_mode: CaptureMode,
    /// Where streamed or on-failure output goes. `None` under `LineStreamed` means output is
    /// observed nowhere but still doesn't block the child on a full pipe.
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
}

impl EngineConfig {
    pub fn new(cache_root: PathBuf) -> EngineConfig {
        EngineConfig {
            cache_root,
            compression: CompressionKind::Lz4,
            cache_mode: CacheMode::ReadWrite,
            local_pool_size: num_cpus(),
            distribution_mode: DistributionMode::Disabled,
            response_file_threshold_bytes: process_runner::RESPONSE_FILE_THRESHOLD_BYTES,
            capture_mode: CaptureMode::BufferOnFailure,
            progress_sink: None,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("cache_root", &self.cache_root)
            .field("compression", &self.compression)
            .field("cache_mode", &self.cache_mode)
            .field("local_pool_size", &self.local_pool_size)
            .field("distribution_mode", &self.distribution_mode)
            .field("response_file_threshold_bytes", &self.response_file_threshold_bytes)
            .field("capture_mode", &self.capture_mode)
            .field("progress_sink", &self.progress_sink.is_some())
            .finish()
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
