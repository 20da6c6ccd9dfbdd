// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::filename::Filename;

/// An ordered set of [`Filename`]s: insertion preserves uniqueness, and [`FileSet::sorted`]
/// gives the canonical order used before anything is fed into a cache key.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileSet(Vec<Filename>);

impl FileSet {
    pub fn new() -> FileSet {
        FileSet(Vec::new())
    }

    pub fn from_iter(files: impl IntoIterator<Item = Filename>) -> FileSet {
        let mut set = FileSet::new();
        for f in files {
            set.insert(f);
        }
        set
    }

    pub fn insert(&mut self, file: Filename) -> bool {
        if self.0.contains(&file) {
            false
        } else {
            self.0.push(file);
            true
        }
    }

    pub fn extend(&mut self, files: impl IntoIterator<Item = Filename>) {
        for f in files {
            self.insert(f);
        }
    }

    pub fn contains(&self, file: &Filename) -> bool {
        self.0.contains(file)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filename> {
        self.0.iter()
    }

    /// Sort in-place, establishing the canonical order required before keying (§4.G).
    pub fn sort(&mut self) {
        self.0.sort();
    }

    /// A sorted copy, leaving `self` in whatever order it was already in.
    pub fn sorted(&self) -> FileSet {
        let mut copy = self.clone();
        copy.sort();
        copy
    }

    pub fn union(&self, other: &FileSet) -> FileSet {
        let mut out = self.clone();
        out.extend(other.0.iter().cloned());
        out
    }

    /// `self \ other`, preserving `self`'s relative order.
    pub fn difference(&self, other: &FileSet) -> FileSet {
        let other: BTreeSet<&Filename> = other.0.iter().collect();
        FileSet(
            self.0
                .iter()
                .filter(|f| !other.contains(f))
                .cloned()
                .collect(),
        )
    }
}

impl IntoIterator for FileSet {
    type Item = Filename;
    type IntoIter = std::vec::IntoIter<Filename>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a Filename;
    type IntoIter = std::slice::Iter<'a, Filename>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<Filename> for FileSet {
    fn from_iter<T: IntoIterator<Item = Filename>>(iter: T) -> Self {
        FileSet::from_iter(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(p: &str) -> Filename {
        Filename::new(p).unwrap()
    }

    #[test]
    fn insertion_dedupes() {
        let mut set = FileSet::new();
        assert!(set.insert(f("/a")));
        assert!(!set.insert(f("/a")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn sort_is_stable_canonical_order() {
        let mut set = FileSet::new();
        set.insert(f("/c"));
        set.insert(f("/a"));
        set.insert(f("/b"));
        set.sort();
        let sorted: Vec<_> = set.iter().map(|f| f.to_string()).collect();
        assert_eq!(sorted, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn difference_removes_members_of_other() {
        let a = FileSet::from_iter([f("/a"), f("/b"), f("/c")]);
        let b = FileSet::from_iter([f("/b")]);
        let diff: Vec<_> = a.difference(&b).iter().map(|f| f.to_string()).collect();
        assert_eq!(diff, vec!["/a", "/c"]);
    }

    #[test]
    fn union_preserves_insertion_order_then_appends_new() {
        let a = FileSet::from_iter([f("/a"), f("/b")]);
        let b = FileSet::from_iter([f("/b"), f("/c")]);
        let union: Vec<_> = a.union(&b).iter().map(|f| f.to_string()).collect();
        assert_eq!(union, vec!["/a", "/b", "/c"]);
    }
}
