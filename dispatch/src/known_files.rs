// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use action_model::{FileSet, Filename};
use parking_lot::Mutex;
use process_runner::{AccessKind, FileAccessRecord, FileAccessSink};

/// Distinguishes dynamic reads from files the action already knows about. Fed to the process
/// runner as a [`FileAccessSink`]; only read-only accesses to paths outside `known` are kept.
pub struct DynamicReadTracker {
    known: FileSet,
    observed: Mutex<FileSet>,
}

impl DynamicReadTracker {
    pub fn new(known: FileSet) -> Arc<DynamicReadTracker> {
        Arc::new(DynamicReadTracker {
            known,
            observed: Mutex::new(FileSet::new()),
        })
    }

    pub fn into_read_files(self: Arc<Self>) -> FileSet {
        Arc::try_unwrap(self)
            .map(|tracker| tracker.observed.into_inner())
            .unwrap_or_else(|shared| shared.observed.lock().clone())
    }
}

impl FileAccessSink for DynamicReadTracker {
    fn record(&self, access: FileAccessRecord) {
        if access.access != AccessKind::Read {
            return;
        }
        let Ok(filename) = Filename::new(&access.path) else {
            return;
        };
        if self.known.contains(&filename) {
            return;
        }
        self.observed.lock().insert(filename);
    }
}
