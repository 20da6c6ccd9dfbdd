// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use crate::command::CommandRules;
use crate::fileset::FileSet;
use crate::options::ActionOptions;

/// A stable textual key identifying an action by its export output's location:
/// `Action/<parent-dir-name>/<file-name>`. Two actions that export the same file collide on
/// purpose — that's the duplicate-output-path case callers are expected to reject upstream.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ActionAlias(String);

impl ActionAlias {
    pub fn from_export_path(path: &std::path::Path) -> ActionAlias {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir_name = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ActionAlias(format!("Action/{dir_name}/{file_name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct ExportIndexOutOfRange {
    pub export_index: i32,
    pub output_count: usize,
}

impl fmt::Display for ExportIndexOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "export_index {} is out of range for {} output file(s)",
            self.export_index, self.output_count
        )
    }
}

impl std::error::Error for ExportIndexOutOfRange {}

/// A single buildable step: a command to run, the files it is declared to produce, which of
/// those is the action's own identity (`export_index`), what must run before it, and the
/// behavior flags controlling caching, distribution, and response files.
#[derive(Clone, Debug)]
pub struct ActionRules {
    pub command: CommandRules,
    pub output_files: FileSet,
    export_index: i32,
    pub prerequisites: Vec<ActionAlias>,
    pub options: ActionOptions,
}

impl ActionRules {
    pub fn new(
        command: CommandRules,
        output_files: FileSet,
        export_index: i32,
        prerequisites: Vec<ActionAlias>,
        options: ActionOptions,
    ) -> Result<ActionRules, ExportIndexOutOfRange> {
        if export_index < 0 || export_index as usize >= output_files.len() {
            return Err(ExportIndexOutOfRange {
                export_index,
                output_count: output_files.len(),
            });
        }
        Ok(ActionRules {
            command,
            output_files,
            export_index,
            prerequisites,
            options,
        })
    }

    pub fn export_index(&self) -> i32 {
        self.export_index
    }

    /// The output file that gives this action its identity (§4.C).
    pub fn export_file(&self) -> &crate::filename::Filename {
        self.output_files
            .iter()
            .nth(self.export_index as usize)
            .expect("export_index was validated at construction")
    }

    pub fn alias(&self) -> ActionAlias {
        ActionAlias::from_export_path(self.export_file().as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::Filename;

    fn command() -> CommandRules {
        CommandRules::new(
            Filename::new("/usr/bin/cc").unwrap(),
            vec!["-c".to_owned()],
            Filename::new("/work").unwrap(),
        )
    }

    #[test]
    fn rejects_export_index_out_of_range() {
        let outputs = FileSet::from_iter([Filename::new("/out/a.o").unwrap()]);
        let err = ActionRules::new(command(), outputs, 5, vec![], ActionOptions::NONE).unwrap_err();
        assert_eq!(err.export_index, 5);
        assert_eq!(err.output_count, 1);
    }

    #[test]
    fn alias_is_derived_from_the_export_output() {
        let outputs = FileSet::from_iter([
            Filename::new("/build/obj/a.o").unwrap(),
            Filename::new("/build/obj/a.d").unwrap(),
        ]);
        let action = ActionRules::new(command(), outputs, 0, vec![], ActionOptions::NONE).unwrap();
        assert_eq!(action.alias().as_str(), "Action/obj/a.o");
    }
}
