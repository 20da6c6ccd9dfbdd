// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use action_model::FileSet;

/// The small slice of source-control querying this cache needs: whether any of a candidate
/// file set is locally modified, so a write that would pollute the cache with in-progress
/// edits can be skipped. Actual source-control integration lives outside this workspace; this
/// trait is the seam it plugs into.
pub trait SourceControlQuery: Send + Sync {
    fn any_locally_modified(&self, candidates: &FileSet) -> bool;
}

/// The default when no source-control adapter is wired up: nothing is ever reported modified,
/// so `ALLOW_SOURCECONTROL` gating becomes a no-op.
pub struct NullSourceControlQuery;

impl SourceControlQuery for NullSourceControlQuery {
    fn any_locally_modified(&self, _candidates: &FileSet) -> bool {
        false
    }
}

#[cfg(test)]
pub struct ScriptedSourceControlQuery {
    pub modified: std::collections::HashSet<String>,
}

#[cfg(test)]
impl SourceControlQuery for ScriptedSourceControlQuery {
    fn any_locally_modified(&self, candidates: &FileSet) -> bool {
        candidates
            .iter()
            .any(|f| self.modified.contains(&f.to_string()))
    }
}
