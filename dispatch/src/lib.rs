// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Decides, per action, whether to run locally on a bounded worker pool or hand the work to a
//! remote cluster, and tracks which files the run actually touched beyond its declared inputs.

mod dispatcher;
mod distribution;
mod known_files;

pub use dispatcher::{DispatchError, DispatchOutcome, DispatchRequest, Dispatcher, DistributionMode};
pub use distribution::{
    testing, DistributedRun, DistributionClient, DistributionRejected, NullDistributionClient,
    PeerAddress,
};
pub use known_files::DynamicReadTracker;
