// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Metric {
    CacheHit,
    CacheMiss,
    CacheStore,
    RemoteActions,
    RemoteFailures,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        use Metric::*;

        match *self {
            CacheHit => "cache_hit",
            CacheMiss => "cache_miss",
            CacheStore => "cache_store",
            RemoteActions => "remote_actions",
            RemoteFailures => "remote_failures",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Histogram {
    ReadTimeMicros,
    WriteTimeMicros,
    InflateTimeMicros,
    DeflateTimeMicros,
    ReadBytes,
    WriteBytes,
    InflateBytes,
    DeflateBytes,
}

impl Histogram {
    pub fn as_str(&self) -> &'static str {
        use Histogram::*;

        match *self {
            ReadTimeMicros => "read_time_micros",
            WriteTimeMicros => "write_time_micros",
            InflateTimeMicros => "inflate_time_micros",
            DeflateTimeMicros => "deflate_time_micros",
            ReadBytes => "read_bytes",
            WriteBytes => "write_bytes",
            InflateBytes => "inflate_bytes",
            DeflateBytes => "deflate_bytes",
        }
    }
}
