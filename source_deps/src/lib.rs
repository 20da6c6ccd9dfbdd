// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Post-process compiler-emitted dependency files into dynamic graph edges: GNU Make `.d`
//! files and MSVC's structured `/sourceDependencies` JSON, unified behind one entry point.

mod make;
mod msvc_json;

use std::fmt;
use std::path::PathBuf;

use action_model::FileSet;

#[derive(Debug, Eq, PartialEq)]
pub struct SourceDependencyParseError {
    pub file: PathBuf,
    pub cause: String,
}

impl fmt::Display for SourceDependencyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse source dependency file {}: {}",
            self.file.display(),
            self.cause
        )
    }
}

impl std::error::Error for SourceDependencyParseError {}

/// Which concrete on-disk format an action's dependency output is in. Callers pick the form
/// explicitly (from the compiler/toolchain that produced it) rather than having this crate
/// guess from the file extension.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SourceDependencyForm {
    /// A GNU Make `-MF` output file.
    Make(PathBuf),
    /// An MSVC `/sourceDependencies` JSON file.
    Json(PathBuf),
}

impl SourceDependencyForm {
    fn path(&self) -> &PathBuf {
        match self {
            SourceDependencyForm::Make(p) | SourceDependencyForm::Json(p) => p,
        }
    }
}

/// Parse `form` and return the set of files it names, resolved relative to `source_root` where
/// the form's paths are relative.
pub fn get_action_source_dependencies(
    form: &SourceDependencyForm,
    source_root: &std::path::Path,
) -> Result<FileSet, SourceDependencyParseError> {
    let path = form.path();
    let contents = std::fs::read_to_string(path).map_err(|e| SourceDependencyParseError {
        file: path.clone(),
        cause: e.to_string(),
    })?;

    let result = match form {
        SourceDependencyForm::Make(_) => make::parse(&contents, source_root),
        SourceDependencyForm::Json(_) => msvc_json::parse(&contents, source_root),
    };

    result.map_err(|cause| {
        log::warn!("source dependency parse failed for {}: {cause}", path.display());
        SourceDependencyParseError {
            file: path.clone(),
            cause,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_and_parses_a_make_depfile_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let dep_path = dir.path().join("a.d");
        std::fs::File::create(&dep_path)
            .unwrap()
            .write_all(b"a.o: a.cpp header.h\n")
            .unwrap();

        let files = get_action_source_dependencies(
            &SourceDependencyForm::Make(dep_path),
            dir.path(),
        )
        .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn reads_and_parses_an_msvc_json_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("a.json");
        std::fs::File::create(&json_path)
            .unwrap()
            .write_all(br#"{"Version":"1.0","Data":{"Source":"a.cpp","Includes":["h.h"]}}"#)
            .unwrap();

        let files = get_action_source_dependencies(
            &SourceDependencyForm::Json(json_path),
            dir.path(),
        )
        .unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn missing_file_fails_with_the_io_cause() {
        let err = get_action_source_dependencies(
            &SourceDependencyForm::Make(PathBuf::from("/does/not/exist.d")),
            std::path::Path::new("/src"),
        )
        .unwrap_err();
        assert_eq!(err.file, PathBuf::from("/does/not/exist.d"));
    }
}
