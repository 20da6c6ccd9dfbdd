// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use action_model::{CommandRules, FileSet};

/// What one action, statically and dynamically, reads and writes — the unit `cache_key` and
/// `cache_read`/`cache_write` operate on. `input_files` are known before the action runs;
/// `dependency_files` are only known after (harvested from file-access tracing or a compiler's
/// own dependency output).
#[derive(Clone, Debug)]
pub struct CacheArtifact {
    pub command: CommandRules,
    pub input_files: FileSet,
    pub dependency_files: FileSet,
    pub output_files: FileSet,
}

impl CacheArtifact {
    pub fn new(
        command: CommandRules,
        input_files: FileSet,
        dependency_files: FileSet,
        output_files: FileSet,
    ) -> CacheArtifact {
        CacheArtifact {
            command,
            input_files: input_files.sorted(),
            dependency_files: dependency_files.sorted(),
            output_files: output_files.sorted(),
        }
    }
}
