// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The static description of buildable work: files, commands, actions, and the digests that
//! identify their inputs. Nothing in this crate touches a process or the filesystem's cache
//! layout — it is the vocabulary the rest of the workspace builds on.

pub mod action;
pub mod command;
pub mod digest_cache;
pub mod fileset;
pub mod filename;
pub mod options;

pub use action::{ActionAlias, ActionRules, ExportIndexOutOfRange};
pub use command::{CommandRules, DuplicateEnvironmentVariable};
pub use digest_cache::{prepare_file_digests, DigestCache, DigestError, FileDigest};
pub use fileset::FileSet;
pub use filename::{Filename, NotAbsolute};
pub use options::ActionOptions;
