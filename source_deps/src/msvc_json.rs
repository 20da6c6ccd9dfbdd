// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;

use action_model::{FileSet, Filename};
use serde::Deserialize;

#[derive(Deserialize)]
struct SourceDependencies {
    #[allow(dead_code)]
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Data")]
    data: Data,
}

#[derive(Deserialize)]
struct Data {
    #[allow(dead_code)]
    #[serde(rename = "Source", default)]
    source: Option<String>,
    #[allow(dead_code)]
    #[serde(rename = "ProvidedModule", default)]
    provided_module: Option<String>,
    #[serde(rename = "PCH", default)]
    pch: Option<String>,
    #[serde(rename = "Includes", default)]
    includes: Vec<String>,
    #[serde(rename = "ImportedModules", default)]
    imported_modules: Vec<ImportedModule>,
    #[serde(rename = "ImportedHeaderUnits", default)]
    imported_header_units: Vec<ImportedHeaderUnit>,
}

#[derive(Deserialize)]
struct ImportedModule {
    #[allow(dead_code)]
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "BMI")]
    bmi: String,
}

#[derive(Deserialize)]
struct ImportedHeaderUnit {
    #[serde(rename = "Header")]
    header: String,
    #[serde(rename = "BMI")]
    bmi: String,
}

/// Parse MSVC's `/sourceDependencies` structured JSON into the union of everything it says the
/// translation unit read: `Includes`, a valid `PCH`, every imported module's `BMI`, and both
/// halves of every imported header unit.
pub fn parse(contents: &str, source_root: &Path) -> Result<FileSet, String> {
    let parsed: SourceDependencies =
        serde_json::from_str(contents).map_err(|e| e.to_string())?;

    let mut files = FileSet::new();
    let mut push = |raw: &str| {
        if raw.is_empty() {
            return;
        }
        files.insert(Filename::resolve(source_root, Path::new(raw)));
    };

    for include in &parsed.data.includes {
        push(include);
    }
    if let Some(pch) = parsed.data.pch.as_deref() {
        push(pch);
    }
    for module in &parsed.data.imported_modules {
        push(&module.bmi);
    }
    for unit in &parsed.data.imported_header_units {
        push(&unit.header);
        push(&unit.bmi);
    }

    Ok(files)
}
