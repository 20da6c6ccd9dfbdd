// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use action_model::{ActionAlias, ActionOptions, CommandRules, FileSet};
use async_trait::async_trait;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PeerAddress(pub String);

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct DistributedRun {
    pub peer: PeerAddress,
    pub read_files: FileSet,
}

#[derive(Debug)]
pub struct DistributionRejected(pub String);

impl fmt::Display for DistributionRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "distribution rejected: {}", self.0)
    }
}

impl std::error::Error for DistributionRejected {}

/// The small surface a remote worker cluster needs to expose. A real implementation (cluster
/// peer discovery, HTTP/webdav transport) lives outside this workspace; this is the seam it
/// plugs into.
#[async_trait]
pub trait DistributionClient: Send + Sync {
    /// Whether this client believes it can currently run work remotely. `force` is passed
    /// through from the `FORCE` distribution mode, for clients that relax admission checks
    /// (e.g. a health check) when the caller insists on remote execution.
    async fn can_distribute(&self, force: bool) -> bool;

    async fn distribute_action(
        &self,
        alias: &ActionAlias,
        command: &CommandRules,
        options: ActionOptions,
    ) -> Result<DistributedRun, DistributionRejected>;
}

/// The default when no cluster is configured: distribution is never attempted, so every action
/// with `ALLOW_DISTRIBUTION` simply runs locally.
pub struct NullDistributionClient;

#[async_trait]
impl DistributionClient for NullDistributionClient {
    async fn can_distribute(&self, _force: bool) -> bool {
        false
    }

    async fn distribute_action(
        &self,
        alias: &ActionAlias,
        _command: &CommandRules,
        _options: ActionOptions,
    ) -> Result<DistributedRun, DistributionRejected> {
        Err(DistributionRejected(format!(
            "no distribution client is configured; cannot distribute {alias}"
        )))
    }
}

/// A scripted double for tests: reports whatever `can_distribute`/outcome the test configured,
/// without touching a network.
pub mod testing {
    use super::*;
    use parking_lot::Mutex;

    pub struct ScriptedDistributionClient {
        pub can_distribute: bool,
        pub outcome: Mutex<Option<Result<DistributedRun, DistributionRejected>>>,
    }

    impl ScriptedDistributionClient {
        pub fn accepting(outcome: Result<DistributedRun, DistributionRejected>) -> ScriptedDistributionClient {
            ScriptedDistributionClient {
                can_distribute: true,
                outcome: Mutex::new(Some(outcome)),
            }
        }

        pub fn refusing() -> ScriptedDistributionClient {
            ScriptedDistributionClient {
                can_distribute: false,
                outcome: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl DistributionClient for ScriptedDistributionClient {
        async fn can_distribute(&self, _force: bool) -> bool {
            self.can_distribute
        }

        async fn distribute_action(
            &self,
            alias: &ActionAlias,
            _command: &CommandRules,
            _options: ActionOptions,
        ) -> Result<DistributedRun, DistributionRejected> {
            self.outcome
                .lock()
                .take()
                .unwrap_or_else(|| Err(DistributionRejected(format!("{alias} scripted twice"))))
        }
    }
}
