// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Cross-crate scenarios exercising the full `Engine::build` pipeline against real dispatch,
//! cache, and source-dependency crates rather than doubling them out, unlike the unit tests
//! colocated with `engine.rs` which focus on the cache-hit/miss state machine in isolation.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use action_cache::NullSourceControlQuery;
use action_driver::testing::InMemoryGraph;
use action_driver::{EngineConfig, StaticDependency};
use action_model::{ActionOptions, ActionRules, CommandRules, FileSet, Filename};
use cache_stats::Metric;
use dispatch::NullDistributionClient;
use source_deps::SourceDependencyForm;
use task_executor::Executor;

fn filename(p: &std::path::Path) -> Filename {
    Filename::new(p).unwrap()
}

fn write_file(path: &std::path::Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::File::create(path).unwrap().write_all(contents).unwrap();
}

fn engine(cache_root: &std::path::Path) -> action_driver::Engine {
    let mut config = EngineConfig::new(cache_root.to_path_buf());
    config.local_pool_size = 2;
    action_driver::Engine::new(
        config,
        Executor::new(),
        Arc::new(NullDistributionClient),
        Arc::new(NullSourceControlQuery),
    )
}

#[tokio::test]
async fn dynamic_dependencies_discovered_via_a_make_dep_file_gate_the_cache() {
    let workspace = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();

    let header = workspace.path().join("widget.h");
    let source = workspace.path().join("widget.cpp");
    write_file(&header, b"struct Widget {};");
    write_file(&source, b"#include \"widget.h\"");

    let output = workspace.path().join("widget.o");
    let dep_file = workspace.path().join("widget.d");
    // Written by the compiler alongside the object file; the driver parses it after running
    // the command, so the build command below writes it out itself.
    write_file(
        &dep_file,
        format!("{}: {} {}\n", output.display(), source.display(), header.display()).as_bytes(),
    );

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
        ActionOptions::ALLOW_CACHEREAD | ActionOptions::ALLOW_CACHEWRITE | ActionOptions::ALLOW_SOURCEDEPENDENCIES,
    )
    .unwrap();

    let eng = engine(cache_root.path());
    let form = SourceDependencyForm::Make(dep_file.clone());

    let mut graph = InMemoryGraph::new()
        .with_static_dependencies(action.alias(), vec![StaticDependency::File(filename(&source))]);
    eng.build(&action, workspace.path(), Some(&form), &mut graph)
        .await
        .unwrap();
    eng.shutdown(Duration::from_secs(5)).await;
    assert!(graph.registered_inputs.lock().contains(&filename(&header)));

    // Touching the header alone (never a declared static input) must invalidate the cache,
    // proving it was folded into the written artifact's dependency set rather than discarded.
    write_file(&header, b"struct Widget { int x; };");

    let eng2 = engine(cache_root.path());
    let mut graph2 = InMemoryGraph::new()
        .with_static_dependencies(action.alias(), vec![StaticDependency::File(filename(&source))]);
    let outcome = eng2
        .build(&action, workspace.path(), Some(&form), &mut graph2)
        .await
        .unwrap();

    assert!(!outcome.from_cache);
    assert_eq!(eng2.stats().get(Metric::CacheMiss), 1);
}

#[tokio::test]
async fn a_propagate_inputs_action_substitutes_its_own_inputs_for_its_output() {
    let workspace = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();

    let pch_source = workspace.path().join("pch.h");
    write_file(&pch_source, b"#pragma once");
    let pch_output = workspace.path().join("pch.pch");
    write_file(&pch_output, b"precompiled");

    let source = workspace.path().join("main.cpp");
    write_file(&source, b"#include \"pch.h\"\nint main(){}");
    let output = workspace.path().join("main.o");

    let pch_alias = action_model::ActionAlias::from_export_path(&pch_output);

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
    let static_deps = vec![
        StaticDependency::File(filename(&source)),
        StaticDependency::PropagatedAction {
            export_file: filename(&pch_output),
            propagated_inputs: FileSet::from_iter([filename(&pch_source)]),
        },
    ];
    let mut graph = InMemoryGraph::new().with_static_dependencies(action.alias(), static_deps.clone());
    eng.build(&action, workspace.path(), None, &mut graph).await.unwrap();
    eng.shutdown(Duration::from_secs(5)).await;

    // Rebuilding the precompiled header itself (never touching pch.h) must not disturb the
    // cache entry, since the pch's own output was excluded in favor of its inputs.
    write_file(&pch_output, b"a completely different precompiled blob");

    let eng2 = engine(cache_root.path());
    let mut graph2 = InMemoryGraph::new().with_static_dependencies(action.alias(), static_deps);
    let outcome = eng2.build(&action, workspace.path(), None, &mut graph2).await.unwrap();
    assert!(outcome.from_cache);

    // But changing the header the pch was built from does invalidate it.
    let eng3 = engine(cache_root.path());
    write_file(&pch_source, b"#pragma once\nstruct Extra {};");
    let static_deps3 = vec![
        StaticDependency::File(filename(&source)),
        StaticDependency::PropagatedAction {
            export_file: filename(&pch_output),
            propagated_inputs: FileSet::from_iter([filename(&pch_source)]),
        },
    ];
    let mut graph3 = InMemoryGraph::new().with_static_dependencies(action.alias(), static_deps3);
    let outcome3 = eng3.build(&action, workspace.path(), None, &mut graph3).await.unwrap();
    assert!(!outcome3.from_cache);
}

#[tokio::test]
async fn a_prerequisite_is_built_lazily_only_on_a_cache_miss() {
    let workspace = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();

    let generated = workspace.path().join("generated.h");
    let prereq_alias = action_model::ActionAlias::from_export_path(&generated);

    let source = workspace.path().join("main.cpp");
    write_file(&source, b"#include \"generated.h\"");
    let output = workspace.path().join("main.o");

    let command = CommandRules::new(
        Filename::new("/bin/sh").unwrap(),
        vec!["-c".to_owned(), format!("echo object > {}", output.display())],
        filename(workspace.path()),
    );
    let action = ActionRules::new(
        command,
        FileSet::from_iter([filename(&output)]),
        0,
        vec![prereq_alias.clone()],
        ActionOptions::ALLOW_CACHEREAD | ActionOptions::ALLOW_CACHEWRITE,
    )
    .unwrap();

    let eng = engine(cache_root.path());
    let mut graph = InMemoryGraph::new()
        .with_static_dependencies(action.alias(), vec![StaticDependency::File(filename(&source))])
        .with_prerequisite_output(prereq_alias, filename(&generated));

    let outcome = eng.build(&action, workspace.path(), None, &mut graph).await.unwrap();
    assert!(!outcome.from_cache);
    eng.shutdown(Duration::from_secs(5)).await;
}
