// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::sync::Arc;

use action_model::{ActionAlias, ActionOptions, CommandRules, FileSet};
use process_runner::{CaptureMode, ProcessError, ProcessSpec, ProgressSink};
use task_executor::{Priority, WorkerPool};

use crate::distribution::DistributionClient;
use crate::known_files::DynamicReadTracker;

/// Whether, and how insistently, actions may be sent to a remote worker cluster.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistributionMode {
    Disabled,
    Enabled,
    /// Like `Enabled`, but a distribution failure is surfaced instead of falling back to local.
    Force,
}

pub struct DispatchRequest {
    pub alias: ActionAlias,
    pub command: CommandRules,
    pub options: ActionOptions,
    /// Static inputs, prerequisite outputs, and this action's own declared outputs: anything a
    /// file access against should *not* count as a newly discovered dynamic read.
    pub known_files: FileSet,
    /// Set by the caller once the command line has been measured against its own configured
    /// threshold; when true, arguments are swapped for a single `@<tmpfile>` before running
    /// locally (remote execution is expected to apply its own limit on its own side).
    pub response_file: bool,
    /// How a locally-run process's stdout/stderr should be handled. Ignored when the action is
    /// distributed remotely, which applies its own capture policy on the worker side.
    pub capture: CaptureMode,
    /// Where captured output goes under either `CaptureMode`. `None` under `LineStreamed` means
    /// output is dropped as it streams rather than buffered, the same as a buffered capture with
    /// nowhere configured to flush to on failure.
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
}

#[derive(Debug)]
pub struct DispatchOutcome {
    pub read_files: FileSet,
    pub peer: Option<crate::distribution::PeerAddress>,
}

#[derive(Debug)]
pub enum DispatchError {
    ProcessFailed { exit_code: i32 },
    SpawnFailed { cause: String },
    DistributionRejected { cause: String },
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::ProcessFailed { exit_code } => {
                write!(f, "process exited with code {exit_code}")
            }
            DispatchError::SpawnFailed { cause } => write!(f, "failed to spawn process: {cause}"),
            DispatchError::DistributionRejected { cause } => {
                write!(f, "distribution rejected and could not fall back: {cause}")
            }
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<ProcessError> for DispatchError {
    fn from(e: ProcessError) -> DispatchError {
        match e {
            ProcessError::ProcessFailed { exit_code } => DispatchError::ProcessFailed { exit_code },
            ProcessError::SpawnFailed { cause } => DispatchError::SpawnFailed { cause },
        }
    }
}

/// Decides between remote distribution and the local worker pool, then runs the action either
/// way, returning the dynamic read set observed.
pub struct Dispatcher {
    local_pool: WorkerPool,
    distribution_client: Arc<dyn DistributionClient>,
    distribution_mode: DistributionMode,
}

impl Dispatcher {
    pub fn new(
        local_pool: WorkerPool,
        distribution_client: Arc<dyn DistributionClient>,
        distribution_mode: DistributionMode,
    ) -> Dispatcher {
        Dispatcher {
            local_pool,
            distribution_client,
            distribution_mode,
        }
    }

    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        if self.distribution_mode != DistributionMode::Disabled && request.options.allow_distribution() {
            let force = self.distribution_mode == DistributionMode::Force;
            if self.distribution_client.can_distribute(force).await {
                match self
                    .distribution_client
                    .distribute_action(&request.alias, &request.command, request.options)
                    .await
                {
                    Ok(run) => {
                        log::debug!("{} distributed to {}", request.alias, run.peer);
                        return Ok(DispatchOutcome {
                            read_files: run.read_files,
                            peer: Some(run.peer),
                        });
                    }
                    Err(e) if force => {
                        return Err(DispatchError::DistributionRejected { cause: e.0 });
                    }
                    Err(e) => {
                        log::warn!("{} distribution rejected ({e}); falling back to local", request.alias);
                    }
                }
            }
        }

        self.run_locally(request).await
    }

    async fn run_locally(&self, request: DispatchRequest) -> Result<DispatchOutcome, DispatchError> {
        let priority = if request.options.high_priority() {
            Priority::High
        } else {
            Priority::Normal
        };

        let tracker = DynamicReadTracker::new(request.known_files);
        let spec = ProcessSpec {
            capture: request.capture,
            response_file: request.response_file,
            file_access_sink: Some(tracker.clone()),
            progress_sink: request.progress_sink,
            ..ProcessSpec::new(request.command)
        };

        self.local_pool
            .run(priority, process_runner::run(spec))
            .await?;

        Ok(DispatchOutcome {
            read_files: tracker.into_read_files(),
            peer: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::testing::ScriptedDistributionClient;
    use crate::distribution::{DistributedRun, DistributionRejected, NullDistributionClient, PeerAddress};
    use action_model::Filename;
    use process_runner::OutputStream;
    use std::sync::Mutex;

    struct CollectingProgressSink(Mutex<Vec<String>>);

    impl ProgressSink for CollectingProgressSink {
        fn line(&self, _stream: OutputStream, line: &str) {
            self.0.lock().unwrap().push(line.to_owned());
        }
    }

    fn request(executable: &str, options: ActionOptions) -> DispatchRequest {
        DispatchRequest {
            alias: ActionAlias::from_export_path(std::path::Path::new("/out/a.o")),
            command: action_model::CommandRules::new(
                Filename::new(executable).unwrap(),
                vec![],
                Filename::new("/tmp").unwrap(),
            ),
            options,
            known_files: FileSet::new(),
            response_file: false,
            capture: CaptureMode::BufferOnFailure,
            progress_sink: None,
        }
    }

    #[tokio::test]
    async fn runs_locally_when_distribution_is_disabled() {
        let dispatcher = Dispatcher::new(
            WorkerPool::new("test", 2),
            Arc::new(NullDistributionClient),
            DistributionMode::Disabled,
        );
        let outcome = dispatcher
            .dispatch(request("/bin/echo", ActionOptions::ALLOW_DISTRIBUTION))
            .await
            .unwrap();
        assert!(outcome.peer.is_none());
    }

    #[tokio::test]
    async fn distributes_when_allowed_and_accepted() {
        let client = ScriptedDistributionClient::accepting(Ok(DistributedRun {
            peer: PeerAddress("worker-1".to_owned()),
            read_files: FileSet::new(),
        }));
        let dispatcher = Dispatcher::new(
            WorkerPool::new("test", 2),
            Arc::new(client),
            DistributionMode::Enabled,
        );
        let outcome = dispatcher
            .dispatch(request("/bin/echo", ActionOptions::ALLOW_DISTRIBUTION))
            .await
            .unwrap();
        assert_eq!(outcome.peer, Some(PeerAddress("worker-1".to_owned())));
    }

    #[tokio::test]
    async fn falls_back_to_local_when_distribution_is_rejected() {
        let client = ScriptedDistributionClient::accepting(Err(DistributionRejected("no workers".to_owned())));
        let dispatcher = Dispatcher::new(
            WorkerPool::new("test", 2),
            Arc::new(client),
            DistributionMode::Enabled,
        );
        let outcome = dispatcher
            .dispatch(request("/bin/echo", ActionOptions::ALLOW_DISTRIBUTION))
            .await
            .unwrap();
        assert!(outcome.peer.is_none());
    }

    #[tokio::test]
    async fn force_mode_surfaces_a_distribution_rejection() {
        let client = ScriptedDistributionClient::accepting(Err(DistributionRejected("no workers".to_owned())));
        let dispatcher = Dispatcher::new(
            WorkerPool::new("test", 2),
            Arc::new(client),
            DistributionMode::Force,
        );
        let err = dispatcher
            .dispatch(request("/bin/echo", ActionOptions::ALLOW_DISTRIBUTION))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::DistributionRejected { .. }));
    }

    #[tokio::test]
    async fn line_streamed_capture_reaches_the_progress_sink() {
        let dispatcher = Dispatcher::new(
            WorkerPool::new("test", 2),
            Arc::new(NullDistributionClient),
            DistributionMode::Disabled,
        );
        let sink = Arc::new(CollectingProgressSink(Mutex::new(Vec::new())));
        let mut req = request("/bin/echo", ActionOptions::NONE);
        req.command.arguments = vec!["hello".to_owned()];
        req.capture = CaptureMode::LineStreamed;
        req.progress_sink = Some(sink.clone());

        dispatcher.dispatch(req).await.unwrap();

        assert_eq!(sink.0.lock().unwrap().as_slice(), ["hello".to_owned()]);
    }

    #[tokio::test]
    async fn a_process_failure_is_surfaced() {
        let dispatcher = Dispatcher::new(
            WorkerPool::new("test", 2),
            Arc::new(NullDistributionClient),
            DistributionMode::Disabled,
        );
        let err = dispatcher
            .dispatch(request("/bin/false", ActionOptions::NONE))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ProcessFailed { .. }));
    }
}
