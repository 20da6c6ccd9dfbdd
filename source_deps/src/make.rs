// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;

use action_model::{FileSet, Filename};

/// Parse a GNU Make `.d` file (`-MF` output): `<target>: <dep> <dep> \` with a trailing
/// backslash-newline continuing the dependency list onto the next line. A backslash before a
/// space escapes it (the dependency contains a literal space); any other backslash is kept
/// verbatim. The target field itself is discarded — only the right-hand side matters here.
pub fn parse(contents: &str, source_root: &Path) -> Result<FileSet, String> {
    let joined = join_continuations(contents);

    let Some(colon) = find_separator(&joined) else {
        return Err("missing ':' separating target from dependencies".to_owned());
    };
    let deps_text = &joined[colon + 1..];

    let mut files = FileSet::new();
    for token in tokenize(deps_text) {
        let path = Path::new(&token);
        let filename = Filename::resolve(source_root, path);
        files.insert(filename);
    }
    Ok(files)
}

/// Undo `\` + newline continuations, replacing each with a single space so that a
/// continued dependency list reads as one logical line.
fn join_continuations(contents: &str) -> String {
    let mut out = String::with_capacity(contents.len());
    let mut chars = contents.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'\n') {
            chars.next();
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// The first `:` not immediately preceded by a single uppercase/lowercase drive letter is the
/// target/dependency separator. This workspace only ever sees `/`-separated paths, so a plain
/// first-colon search is sufficient.
fn find_separator(line: &str) -> Option<usize> {
    line.find(':')
}

/// Split on unescaped whitespace; `\ ` becomes a literal space within a token, `\\` becomes a
/// literal backslash, and any other backslash-escape is passed through unchanged.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(' ') => {
                    current.push(' ');
                    chars.next();
                }
                Some('\\') => {
                    current.push('\\');
                    chars.next();
                }
                Some(&next) => {
                    current.push('\\');
                    current.push(next);
                    chars.next();
                }
                None => current.push('\\'),
            },
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
