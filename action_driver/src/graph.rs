// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use action_model::{ActionAlias, FileSet, Filename};
use task_executor::Priority;

use crate::error::Error;

/// A single static dependency edge, already classified by the graph into the three shapes
/// `harvest_inputs` cares about (§4.C step 1): a plain file, a built action whose canonical
/// output feeds in as-is, or a `PROPAGATE_INPUTS` action whose own (already-resolved) inputs
/// substitute for its output.
#[derive(Clone, Debug)]
pub enum StaticDependency {
    File(Filename),
    Action { export_file: Filename },
    PropagatedAction {
        export_file: Filename,
        propagated_inputs: FileSet,
    },
}

/// The caller-observable surface a build graph exposes to the driver (consumed, never
/// implemented, by this crate).
pub trait BuildGraph {
    /// The action's statically declared dependency edges, in graph order.
    fn get_static_dependencies(&self, action: &ActionAlias) -> Vec<StaticDependency>;

    /// Block until every file in `files` is available, registering them as inputs of the
    /// action currently being built.
    fn need_files(&mut self, files: FileSet) -> Result<(), Error>;

    /// Resolve and build (if necessary) the given aliases, returning their canonical outputs.
    /// Used for `prerequisites`, which only build lazily on a cache miss.
    fn need_build_aliasables(&mut self, aliases: &[ActionAlias]) -> Result<FileSet, Error>;

    /// Register `files` as this action's outputs.
    fn output_file(&mut self, files: FileSet);

    /// Register a callback invoked once this action's node is marked built.
    fn on_built(&mut self, callback: Box<dyn FnOnce() + Send>);

    /// Attach a human-readable annotation to the current node (e.g. `"CACHE"` on a hit, or the
    /// address of the peer that ran it remotely).
    fn annotate(&mut self, annotation: &str);

    /// Run `body` on a named worker thread at the given priority, returning its result.
    fn worker_thread(
        &mut self,
        tag: &str,
        priority: Priority,
        body: Box<dyn FnOnce() -> Result<(), Error> + Send>,
    ) -> Result<(), Error>;
}

/// An in-memory `BuildGraph` double kept outside `#[cfg(test)]` so integration tests under
/// `tests/` (a separate crate target) can depend on it too, the same way `dispatch::testing`
/// stays reachable from outside its own crate.
pub mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// An in-memory `BuildGraph` for tests. Static dependencies and prerequisite export files
    /// are registered up front; `need_files` always succeeds (there is no real wait to do),
    /// and `need_build_aliasables` looks up each alias's registered export file.
    pub struct InMemoryGraph {
        static_deps: HashMap<ActionAlias, Vec<StaticDependency>>,
        prerequisite_outputs: HashMap<ActionAlias, Filename>,
        pub annotations: Arc<Mutex<Vec<String>>>,
        pub registered_inputs: Arc<Mutex<FileSet>>,
        pub outputs: Arc<Mutex<FileSet>>,
    }

    impl InMemoryGraph {
        pub fn new() -> InMemoryGraph {
            InMemoryGraph {
                static_deps: HashMap::new(),
                prerequisite_outputs: HashMap::new(),
                annotations: Arc::new(Mutex::new(Vec::new())),
                registered_inputs: Arc::new(Mutex::new(FileSet::new())),
                outputs: Arc::new(Mutex::new(FileSet::new())),
            }
        }

        pub fn with_static_dependencies(mut self, action: ActionAlias, deps: Vec<StaticDependency>) -> Self {
            self.static_deps.insert(action, deps);
            self
        }

        pub fn with_prerequisite_output(mut self, alias: ActionAlias, export_file: Filename) -> Self {
            self.prerequisite_outputs.insert(alias, export_file);
            self
        }
    }

    impl BuildGraph for InMemoryGraph {
        fn get_static_dependencies(&self, action: &ActionAlias) -> Vec<StaticDependency> {
            self.static_deps.get(action).cloned().unwrap_or_default()
        }

        fn need_files(&mut self, files: FileSet) -> Result<(), Error> {
            self.registered_inputs.lock().extend(files);
            Ok(())
        }

        fn need_build_aliasables(&mut self, aliases: &[ActionAlias]) -> Result<FileSet, Error> {
            let mut outputs = FileSet::new();
            for alias in aliases {
                if let Some(export_file) = self.prerequisite_outputs.get(alias) {
                    outputs.insert(export_file.clone());
                }
            }
            Ok(outputs)
        }

        fn output_file(&mut self, files: FileSet) {
            self.outputs.lock().extend(files);
        }

        fn on_built(&mut self, callback: Box<dyn FnOnce() + Send>) {
            callback();
        }

        fn annotate(&mut self, annotation: &str) {
            self.annotations.lock().push(annotation.to_owned());
        }

        fn worker_thread(
            &mut self,
            _tag: &str,
            _priority: Priority,
            body: Box<dyn FnOnce() -> Result<(), Error> + Send>,
        ) -> Result<(), Error> {
            body()
        }
    }
}
