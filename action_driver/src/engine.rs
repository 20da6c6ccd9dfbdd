// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use action_cache::{CacheArtifact, CacheError, FilesystemActionCache, SourceControlQuery};
use action_model::{ActionRules, FileDigest, FileSet, Filename};
use cache_stats::{CacheStats, Metric};
use dispatch::{DispatchError, DispatchRequest, Dispatcher, DistributionClient, PeerAddress};
use source_deps::SourceDependencyForm;
use task_executor::{BackgroundQueue, Executor, WorkerPool};

use crate::config::EngineConfig;
use crate::error::{Error, MissingOutput};
use crate::graph::{BuildGraph, StaticDependency};

/// What one `build` call produced: the actual output files (after the hot-reload lowercasing
/// quirk, if it applied) and where the outputs came from.
#[derive(Debug)]
pub struct BuildOutcome {
    pub output_files: FileSet,
    pub from_cache: bool,
    pub peer: Option<PeerAddress>,
}

/// Ties the action cache, the dispatcher, and the digest cache together behind the `Build`
/// algorithm. One `Engine` is constructed per build invocation (or reused across many, since
/// nothing here is per-action state); `shutdown` must be called once to drain the background
/// cache-write queue.
pub struct Engine {
    config: EngineConfig,
    cache: Arc<FilesystemActionCache>,
    dispatcher: Dispatcher,
    digest_cache: action_model::DigestCache,
    background: BackgroundQueue,
    executor: Executor,
    stats: Arc<CacheStats>,
    source_control: Arc<dyn SourceControlQuery>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        executor: Executor,
        distribution_client: Arc<dyn DistributionClient>,
        source_control: Arc<dyn SourceControlQuery>,
    ) -> Engine {
        let cache = Arc::new(FilesystemActionCache::new(config.cache_root.clone(), config.compression));
        let local_pool = WorkerPool::new("local-actions", config.local_pool_size);
        let dispatcher = Dispatcher::new(local_pool, distribution_client, config.distribution_mode);
        let digest_cache = action_model::DigestCache::new(executor.clone());
        Engine {
            config,
            cache,
            dispatcher,
            digest_cache,
            background: BackgroundQueue::new(),
            executor,
            stats: Arc::new(CacheStats::new()),
            source_control,
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Wait for every cache write scheduled by a prior `build` to finish, up to `timeout`.
    pub async fn shutdown(&self, timeout: Duration) {
        self.background.drain(timeout).await;
    }

    async fn digest_many(&self, files: &FileSet) -> Result<Vec<FileDigest>, Error> {
        let pending = action_model::prepare_file_digests(&self.digest_cache, files.iter().cloned());
        let digests = futures::future::try_join_all(pending).await?;
        Ok(digests)
    }

    /// Runs the §4.C algorithm for one action: gather static inputs, try the cache, build
    /// prerequisites and execute on miss, verify outputs, and schedule an asynchronous cache
    /// write. `source_dependency_form`, when set, is parsed after execution and its files
    /// folded into the dynamic dependency set the same way a detouring-based read would be —
    /// this is the harvesting path actually used on every platform this workspace runs on,
    /// since a real detouring backend is an external collaborator we don't have.
    pub async fn build(
        &self,
        action: &ActionRules,
        workspace_root: &Path,
        source_dependency_form: Option<&SourceDependencyForm>,
        graph: &mut dyn BuildGraph,
    ) -> Result<BuildOutcome, Error> {
        let alias = action.alias();

        // Step 1: gather static inputs.
        let mut static_inputs = FileSet::new();
        let mut excluded_inputs = FileSet::new();
        for dep in graph.get_static_dependencies(&alias) {
            match dep {
                StaticDependency::File(file) => {
                    static_inputs.insert(file);
                }
                StaticDependency::Action { export_file } => {
                    static_inputs.insert(export_file);
                }
                StaticDependency::PropagatedAction {
                    export_file,
                    propagated_inputs,
                } => {
                    static_inputs.extend(propagated_inputs);
                    excluded_inputs.insert(export_file);
                }
            }
        }
        static_inputs.sort();

        // Step 2: attempt a cache read.
        if action.options.allow_cache_read() && self.config.cache_mode.allows_read() {
            let read_artifact = CacheArtifact::new(
                action.command.clone(),
                static_inputs.clone(),
                FileSet::new(),
                action.output_files.clone(),
            );
            let input_digests = self.digest_many(&static_inputs).await?;
            let key = self.cache.cache_key(&read_artifact, &input_digests)?;

            match self.cache.cache_read(&key, &read_artifact, workspace_root, self.stats.as_ref()) {
                Ok(dependency_files) => {
                    self.stats.record(Metric::CacheHit);
                    graph.annotate("CACHE");
                    graph.need_files(dependency_files)?;
                    graph.output_file(action.output_files.clone());
                    return Ok(BuildOutcome {
                        output_files: action.output_files.clone(),
                        from_cache: true,
                        peer: None,
                    });
                }
                Err(CacheError::Miss) => {
                    self.stats.record(Metric::CacheMiss);
                }
                Err(e @ (CacheError::Corruption(_) | CacheError::BulkMismatch(_))) => {
                    log::warn!("{alias}: treating cache read failure as a miss: {e}");
                    self.stats.record(Metric::CacheMiss);
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Step 3: build prerequisites, lazily, only now that a miss is confirmed.
        let prerequisite_files = if action.prerequisites.is_empty() {
            FileSet::new()
        } else {
            graph.need_build_aliasables(&action.prerequisites)?
        };

        // Step 4: execute or distribute.
        let mut exec_command = action.command.clone();
        if action.options.allow_relative_path() {
            exec_command.arguments = process_runner::relativize_arguments(&exec_command.arguments, workspace_root);
        }
        let response_file = action.options.allow_response_file()
            && exceeds_configured_threshold(&exec_command, self.config.response_file_threshold_bytes);

        let mut known_files = static_inputs.union(&prerequisite_files);
        known_files.extend(action.output_files.clone());

        let request = DispatchRequest {
            alias: alias.clone(),
            command: exec_command,
            options: action.options,
            known_files,
            response_file,
            capture: self.config.capture_mode,
            progress_sink: self.config.progress_sink.clone(),
        };

        let dispatch_outcome = match self.dispatcher.dispatch(request).await {
            Ok(outcome) => outcome,
            Err(e @ DispatchError::DistributionRejected { .. }) => {
                self.stats.record(Metric::RemoteFailures);
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(peer) = &dispatch_outcome.peer {
            self.stats.record(Metric::RemoteActions);
            graph.annotate(&format!("distributed to {peer}"));
        }

        let mut read_files = dispatch_outcome.read_files;

        // Step 7 (harvested here rather than after the cache write: on platforms without a
        // detouring backend, this is the only source of dynamic dependencies there is, so the
        // write this build schedules needs it too).
        if action.options.allow_source_dependencies() {
            if let Some(form) = source_dependency_form {
                let harvested = source_deps::get_action_source_dependencies(form, workspace_root)?;
                graph.need_files(harvested.clone())?;
                read_files.extend(harvested);
            }
        }

        // Step 5: verify outputs, applying the hot-reload lowercasing quirk.
        let mut resolved_outputs = FileSet::new();
        for declared in action.output_files.iter() {
            resolved_outputs.insert(resolve_actual_output(declared)?);
        }
        graph.output_file(resolved_outputs.clone());

        // Step 6: schedule the cache write.
        if action.options.allow_cache_write() && self.config.cache_mode.allows_write() {
            let dependency_files = read_files
                .union(&prerequisite_files)
                .difference(&static_inputs)
                .difference(&excluded_inputs)
                .sorted();

            let write_artifact = CacheArtifact::new(
                action.command.clone(),
                static_inputs.clone(),
                dependency_files,
                resolved_outputs.clone(),
            );
            let combined_files = write_artifact.input_files.union(&write_artifact.dependency_files);
            let combined_digests = self.digest_many(&combined_files).await?;
            let key = self.cache.cache_key(&write_artifact, &combined_digests)?;

            let cache = self.cache.clone();
            let stats = self.stats.clone();
            let source_control = self.source_control.clone();
            let workspace_root = workspace_root.to_path_buf();
            let gate_on_source_control = action.options.allow_source_control();

            self.background.submit(&self.executor, async move {
                match cache.cache_write(
                    &key,
                    &write_artifact,
                    &combined_digests,
                    &workspace_root,
                    gate_on_source_control,
                    source_control.as_ref(),
                    stats.as_ref(),
                ) {
                    Ok(()) => stats.record(Metric::CacheStore),
                    Err(e) => log::warn!("cache write failed for {key}: {e}"),
                }
            });
        }

        Ok(BuildOutcome {
            output_files: resolved_outputs,
            from_cache: false,
            peer: dispatch_outcome.peer,
        })
    }
}

fn exceeds_configured_threshold(command: &action_model::CommandRules, threshold: usize) -> bool {
    let total: usize = command.arguments.iter().map(|a| a.len() + 1).sum();
    total > threshold
}

/// Most outputs exist exactly where declared. MSVC's edit-and-continue mode is a documented
/// exception: it sometimes writes the lowercased filename instead. Treat that as the real
/// output rather than failing the build over a casing difference on a case-preserving
/// filesystem.
fn resolve_actual_output(declared: &Filename) -> Result<Filename, Error> {
    if declared.as_path().exists() {
        return Ok(declared.clone());
    }

    if let (Some(name), Some(parent)) = (declared.file_name(), declared.parent()) {
        let name = name.to_string_lossy();
        let lowered = name.to_lowercase();
        if lowered != *name {
            let candidate = parent.join(&lowered);
            if candidate.exists() {
                log::debug!("treating lowercased {} as the actual output for {declared}", candidate.display());
                return Ok(Filename::new(candidate).expect("joined onto an absolute parent"));
            }
        }
    }

    Err(Error::MissingOutput(MissingOutput {
        path: declared.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheMode, EngineConfig};
    use crate::graph::testing::InMemoryGraph;
    use crate::graph::StaticDependency;
    use action_cache::NullSourceControlQuery;
    use action_model::{ActionOptions, CommandRules, FileSet, Filename};
    use dispatch::NullDistributionClient;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use task_executor::Executor;

    fn filename(p: &std::path::Path) -> Filename {
        Filename::new(p).unwrap()
    }

    fn engine(cache_root: &std::path::Path) -> Engine {
        let mut config = EngineConfig::new(cache_root.to_path_buf());
        config.local_pool_size = 2;
        Engine::new(
            config,
            Executor::new(),
            Arc::new(NullDistributionClient),
            Arc::new(NullSourceControlQuery),
        )
    }

    fn write_file(path: &std::path::Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::File::create(path).unwrap().write_all(contents).unwrap();
    }

    #[tokio::test]
    async fn cold_build_runs_the_command_and_schedules_a_cache_write() {
        let workspace = tempfile::tempdir().unwrap();
        let cache_root = tempfile::tempdir().unwrap();
        write_file(&workspace.path().join("a.cpp"), b"int main(){}");

        let output = workspace.path().join("a.o");
        let command = CommandRules::new(
            Filename::new("/bin/sh").unwrap(),
            vec!["-c".to_owned(), format!("echo object > {}", output.display())],
            filename(workspace.path()),
        );
        let action = ActionRules::new(
            command,
            FileSet::from_iter([filename(&output)]),
            0,
            vec![],
            ActionOptions::ALLOW_CACHEREAD | ActionOptions::ALLOW_CACHEWRITE,
        )
        .unwrap();

        let engine = engine(cache_root.path());
        let mut graph = InMemoryGraph::new().with_static_dependencies(
            action.alias(),
            vec![StaticDependency::File(filename(&workspace.path().join("a.cpp")))],
        );

        let outcome = engine
            .build(&action, workspace.path(), None, &mut graph)
            .await
            .unwrap();

        assert!(!outcome.from_cache);
        assert!(output.exists());

        engine.shutdown(Duration::from_secs(5)).await;
        assert_eq!(engine.stats().get(Metric::CacheStore), 1);
    }

    #[tokio::test]
    async fn warm_build_is_served_from_cache_without_rerunning_the_command() {
        let workspace = tempfile::tempdir().unwrap();
        let cache_root = tempfile::tempdir().unwrap();
        write_file(&workspace.path().join("a.cpp"), b"int main(){}");
        let output = workspace.path().join("a.o");

        let command = CommandRules::new(
            Filename::new("/bin/sh").unwrap(),
            vec!["-c".to_owned(), format!("echo -n one >> {}", output.display())],
            filename(workspace.path()),
        );
        let action = ActionRules::new(
            command,
            FileSet::from_iter([filename(&output)]),
            0,
            vec![],
            ActionOptions::ALLOW_CACHEREAD | ActionOptions::ALLOW_CACHEWRITE,
        )
        .unwrap();

        let eng = engine(cache_root.path());
        let static_deps = vec![StaticDependency::File(filename(&workspace.path().join("a.cpp")))];

        let mut graph = InMemoryGraph::new().with_static_dependencies(action.alias(), static_deps.clone());
        eng.build(&action, workspace.path(), None, &mut graph).await.unwrap();
        eng.shutdown(Duration::from_secs(5)).await;
        assert_eq!(std::fs::read(&output).unwrap(), b"one");

        let eng2 = engine(cache_root.path());
        let mut graph2 = InMemoryGraph::new().with_static_dependencies(action.alias(), static_deps);
        let outcome = eng2.build(&action, workspace.path(), None, &mut graph2).await.unwrap();

        assert!(outcome.from_cache);
        // The command would have appended a second "one"; a cache hit must not have rerun it.
        assert_eq!(std::fs::read(&output).unwrap(), b"one");
        assert_eq!(eng2.stats().get(Metric::CacheHit), 1);
    }

    #[tokio::test]
    async fn changing_an_input_file_invalidates_the_cache() {
        let workspace = tempfile::tempdir().unwrap();
        let cache_root = tempfile::tempdir().unwrap();
        let source = workspace.path().join("a.cpp");
        write_file(&source, b"int main(){}");
        let output = workspace.path().join("a.o");

        let command = CommandRules::new(
            Filename::new("/bin/sh").unwrap(),
            vec!["-c".to_owned(), format!("echo object > {}", output.display())],
            filename(workspace.path()),
        );
        let action = ActionRules::new(
            command,
            FileSet::from_iter([filename(&output)]),
            0,
            vec![],
            ActionOptions::ALLOW_CACHEREAD | ActionOptions::ALLOW_CACHEWRITE,
        )
        .unwrap();

        let eng = engine(cache_root.path());
        let static_deps = vec![StaticDependency::File(filename(&source))];
        let mut graph = InMemoryGraph::new().with_static_dependencies(action.alias(), static_deps.clone());
        eng.build(&action, workspace.path(), None, &mut graph).await.unwrap();
        eng.shutdown(Duration::from_secs(5)).await;

        write_file(&source, b"int main(){ return 1; }");

        let eng2 = engine(cache_root.path());
        let mut graph2 = InMemoryGraph::new().with_static_dependencies(action.alias(), static_deps);
        let outcome = eng2.build(&action, workspace.path(), None, &mut graph2).await.unwrap();

        assert!(!outcome.from_cache);
        assert_eq!(eng2.stats().get(Metric::CacheMiss), 1);
    }

    #[tokio::test]
    async fn a_missing_declared_output_fails_the_build() {
        let workspace = tempfile::tempdir().unwrap();
        let cache_root = tempfile::tempdir().unwrap();

        let command = CommandRules::new(Filename::new("/bin/true").unwrap(), vec![], filename(workspace.path()));
        let action = ActionRules::new(
            command,
            FileSet::from_iter([filename(&workspace.path().join("never-written.o"))]),
            0,
            vec![],
            ActionOptions::NONE,
        )
        .unwrap();

        let engine = engine(cache_root.path());
        let mut graph = InMemoryGraph::new();
        let err = engine.build(&action, workspace.path(), None, &mut graph).await.unwrap_err();
        assert!(matches!(err, Error::MissingOutput(_)));
    }

    #[test]
    fn cache_mode_gates_reads_and_writes_independently() {
        assert!(CacheMode::ReadWrite.allows_read());
        assert!(CacheMode::ReadWrite.allows_write());
        assert!(CacheMode::ReadOnly.allows_read());
        assert!(!CacheMode::ReadOnly.allows_write());
        assert!(!CacheMode::Disabled.allows_read());
        assert!(!CacheMode::Disabled.allows_write());
    }
}
