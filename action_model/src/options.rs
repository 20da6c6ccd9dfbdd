// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::ops::{BitOr, BitOrAssign};

/// Per-action behavior flags.
///
/// There is deliberately no composite "allow cache read+write" bit: it would just be
/// `ALLOW_CACHEREAD | ALLOW_CACHEWRITE` spelled a second way, so instead
/// [`ActionOptions::allow_cache_read_write`] is offered as a convenience predicate rather than
/// a tenth named flag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ActionOptions(u16);

macro_rules! flags {
    ($( $(#[$meta:meta])* $name:ident = $bit:expr ; )*) => {
        impl ActionOptions {
            $(
                $(#[$meta])*
                pub const $name: ActionOptions = ActionOptions(1 << $bit);
            )*
        }
    };
}

flags! {
    /// The action's cached output may be read instead of re-running the command.
    ALLOW_CACHEREAD = 0;
    /// A successful run's outputs may be written back into the cache.
    ALLOW_CACHEWRITE = 1;
    /// The action may be handed to a [`crate`] distribution client instead of running locally.
    ALLOW_DISTRIBUTION = 2;
    /// Command-line arguments naming output files may stay relative to the working directory.
    ALLOW_RELATIVEPATH = 3;
    /// The command line may be swapped for a response file when it grows too long.
    ALLOW_RESPONSEFILE = 4;
    /// The action's inputs may include files tracked by source control metadata.
    ALLOW_SOURCECONTROL = 5;
    /// Compiler-emitted `.d`/JSON dependency output should be harvested after the run.
    ALLOW_SOURCEDEPENDENCIES = 6;
    /// This action's declared inputs propagate to whatever depends on its outputs.
    PROPAGATE_INPUTS = 7;
    /// Dispatch this action ahead of queued normal-priority work.
    HIGH_PRIORITY = 8;
}

impl ActionOptions {
    pub const NONE: ActionOptions = ActionOptions(0);

    pub fn contains(&self, other: ActionOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn allow_cache_read(&self) -> bool {
        self.contains(ActionOptions::ALLOW_CACHEREAD)
    }

    pub fn allow_cache_write(&self) -> bool {
        self.contains(ActionOptions::ALLOW_CACHEWRITE)
    }

    /// True only when both cache directions are allowed; not itself a distinct bit.
    pub fn allow_cache_read_write(&self) -> bool {
        self.allow_cache_read() && self.allow_cache_write()
    }

    pub fn allow_distribution(&self) -> bool {
        self.contains(ActionOptions::ALLOW_DISTRIBUTION)
    }

    pub fn allow_relative_path(&self) -> bool {
        self.contains(ActionOptions::ALLOW_RELATIVEPATH)
    }

    pub fn allow_response_file(&self) -> bool {
        self.contains(ActionOptions::ALLOW_RESPONSEFILE)
    }

    pub fn allow_source_control(&self) -> bool {
        self.contains(ActionOptions::ALLOW_SOURCECONTROL)
    }

    pub fn allow_source_dependencies(&self) -> bool {
        self.contains(ActionOptions::ALLOW_SOURCEDEPENDENCIES)
    }

    pub fn propagate_inputs(&self) -> bool {
        self.contains(ActionOptions::PROPAGATE_INPUTS)
    }

    pub fn high_priority(&self) -> bool {
        self.contains(ActionOptions::HIGH_PRIORITY)
    }
}

impl BitOr for ActionOptions {
    type Output = ActionOptions;

    fn bitor(self, rhs: ActionOptions) -> ActionOptions {
        ActionOptions(self.0 | rhs.0)
    }
}

impl BitOrAssign for ActionOptions {
    fn bitor_assign(&mut self, rhs: ActionOptions) {
        self.0 |= rhs.0;
    }
}

impl Default for ActionOptions {
    fn default() -> Self {
        ActionOptions::NONE
    }
}
