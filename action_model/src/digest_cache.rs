// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use hashing::Digest;
use parking_lot::Mutex;
use task_executor::Executor;

use crate::filename::Filename;

#[derive(Clone, Debug)]
pub struct DigestError {
    pub source: Filename,
    pub message: String,
}

impl fmt::Display for DigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to digest {}: {}", self.source, self.message)
    }
}

impl std::error::Error for DigestError {}

#[derive(Clone, Debug)]
pub struct FileDigest {
    pub source: Filename,
    pub digest: Digest,
}

type SharedDigest = Shared<BoxFuture<'static, Result<Digest, DigestError>>>;

/// A process-wide memoization layer over [`hashing::digest_file_async`]: the same file is
/// hashed off disk at most once per build, no matter how many actions declare it as an input.
/// Concurrent callers for the same file share one in-flight read rather than racing it.
#[derive(Clone)]
pub struct DigestCache {
    executor: Executor,
    inflight: Arc<Mutex<HashMap<Filename, SharedDigest>>>,
}

impl DigestCache {
    pub fn new(executor: Executor) -> DigestCache {
        DigestCache {
            executor,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget every memoized digest, e.g. between builds when files may have changed on disk.
    pub fn clear(&self) {
        self.inflight.lock().clear();
    }

    fn get_or_spawn(&self, file: Filename) -> SharedDigest {
        let mut inflight = self.inflight.lock();
        if let Some(existing) = inflight.get(&file) {
            return existing.clone();
        }

        let spawned_file = file.clone();
        let handle = self
            .executor
            .spawn(async move { hashing::digest_file_async(spawned_file.as_path()).await });

        let file_for_error = file.clone();
        let future: BoxFuture<'static, Result<Digest, DigestError>> = async move {
            match handle.await {
                Ok(Ok(digest)) => Ok(digest),
                Ok(Err(io_err)) => Err(DigestError {
                    source: file_for_error,
                    message: io_err.to_string(),
                }),
                Err(join_err) => Err(DigestError {
                    source: file_for_error,
                    message: format!("digest task panicked: {join_err}"),
                }),
            }
        }
        .boxed();

        let shared = future.shared();
        inflight.insert(file, shared.clone());
        shared
    }

    pub async fn digest(&self, file: Filename) -> Result<FileDigest, DigestError> {
        let shared = self.get_or_spawn(file.clone());
        let digest = shared.await?;
        Ok(FileDigest {
            source: file,
            digest,
        })
    }
}

/// Kick off (but don't block on) digesting every file in `files`, returning the lazily-resolved
/// futures in the same order. Awaiting them concurrently (e.g. via `futures::future::try_join_all`)
/// lets independent reads overlap instead of serializing behind each other.
pub fn prepare_file_digests<T: IntoIterator<Item = Filename>>(
    cache: &DigestCache,
    files: T,
) -> Vec<impl std::future::Future<Output = Result<FileDigest, DigestError>> + use<'_, T>> {
    files.into_iter().map(|f| cache.digest(f)).collect()
}
