// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeMap;
use std::fmt;

use hashing::FingerprintSink;

use crate::filename::Filename;

/// The platform path-list separator used when exporting a multi-valued environment variable.
#[cfg(windows)]
const ENV_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const ENV_LIST_SEPARATOR: &str = ":";

#[derive(Debug, Eq, PartialEq)]
pub struct DuplicateEnvironmentVariable(pub String);

impl fmt::Display for DuplicateEnvironmentVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "environment variable {:?} was declared more than once", self.0)
    }
}

impl std::error::Error for DuplicateEnvironmentVariable {}

/// One external-process invocation's command line, environment, and working directory.
///
/// `environment` holds ordered value lists rather than plain strings because some variables
/// (notably `PATH`-like ones) are naturally built up from several independent contributors
/// before being joined for export; the invariant is that each variable name appears at most
/// once in the list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandRules {
    pub executable: Filename,
    pub arguments: Vec<String>,
    environment: Vec<(String, Vec<String>)>,
    pub working_dir: Filename,
}

impl CommandRules {
    pub fn new(
        executable: Filename,
        arguments: Vec<String>,
        working_dir: Filename,
    ) -> CommandRules {
        CommandRules {
            executable,
            arguments,
            environment: Vec::new(),
            working_dir,
        }
    }

    pub fn with_environment(
        mut self,
        environment: Vec<(String, Vec<String>)>,
    ) -> Result<CommandRules, DuplicateEnvironmentVariable> {
        let mut seen = std::collections::HashSet::new();
        for (name, _) in &environment {
            if !seen.insert(name.clone()) {
                return Err(DuplicateEnvironmentVariable(name.clone()));
            }
        }
        self.environment = environment;
        Ok(self)
    }

    pub fn environment(&self) -> &[(String, Vec<String>)] {
        &self.environment
    }

    /// The environment as it should be handed to a process spawn call: each variable's value
    /// list joined with the platform separator.
    pub fn export_environment(&self) -> BTreeMap<String, String> {
        self.environment
            .iter()
            .map(|(name, values)| (name.clone(), values.join(ENV_LIST_SEPARATOR)))
            .collect()
    }

    /// Write this command's fields into `sink` in a fixed canonical order, for use as part of
    /// a larger seeded fingerprint (the action cache key in particular).
    pub fn hash_into(&self, sink: &mut FingerprintSink) {
        sink.update_str(&self.executable.to_string());
        sink.update_u64(self.arguments.len() as u64);
        for arg in &self.arguments {
            sink.update_str(arg);
        }
        sink.update_u64(self.environment.len() as u64);
        for (name, values) in &self.environment {
            sink.update_str(name);
            sink.update_u64(values.len() as u64);
            for value in values {
                sink.update_str(value);
            }
        }
        sink.update_str(&self.working_dir.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filename(p: &str) -> Filename {
        Filename::new(p).unwrap()
    }

    #[test]
    fn rejects_duplicate_environment_names() {
        let cmd = CommandRules::new(filename("/usr/bin/cc"), vec![], filename("/work"));
        let err = cmd
            .with_environment(vec![
                ("PATH".to_owned(), vec!["/bin".to_owned()]),
                ("PATH".to_owned(), vec!["/usr/bin".to_owned()]),
            ])
            .unwrap_err();
        assert_eq!(err.0, "PATH");
    }

    #[test]
    fn export_joins_values_with_platform_separator() {
        let cmd = CommandRules::new(filename("/usr/bin/cc"), vec![], filename("/work"))
            .with_environment(vec![(
                "PATH".to_owned(),
                vec!["/bin".to_owned(), "/usr/bin".to_owned()],
            )])
            .unwrap();
        let exported = cmd.export_environment();
        assert_eq!(exported["PATH"], format!("/bin{ENV_LIST_SEPARATOR}/usr/bin"));
    }

    #[test]
    fn hash_into_is_sensitive_to_every_field() {
        let base = CommandRules::new(
            filename("/usr/bin/clang++"),
            vec!["-c".to_owned(), "a.cpp".to_owned()],
            filename("/work"),
        );
        let mut changed_arg = base.clone();
        changed_arg.arguments[1] = "b.cpp".to_owned();

        let mut sink_a = FingerprintSink::new(b"test");
        base.hash_into(&mut sink_a);
        let mut sink_b = FingerprintSink::new(b"test");
        changed_arg.hash_into(&mut sink_b);
        assert_ne!(sink_a.finish(), sink_b.finish());
    }
}
