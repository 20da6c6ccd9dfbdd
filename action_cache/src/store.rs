// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::{Path, PathBuf};
use std::time::Instant;

use action_model::{FileDigest, FileSet, Filename};
use cache_stats::{CacheStats, Histogram};
use hashing::{Fingerprint, FingerprintSink};

use crate::artifact::CacheArtifact;
use crate::bulk::{self, BulkEntry, CompressionKind};
use crate::entry::{self, ActionCacheBulk, ActionCacheEntry};
use crate::error::CacheError;
use crate::key::{cache_key, ActionCacheKey};
use crate::source_control::SourceControlQuery;

pub use crate::key::MissingInputDigest;

/// Two-level content-addressed store at a configurable root directory: a small `.cache` file
/// per action key enumerating the bulks observed for it, each bulk a compressed `.bulk` archive
/// of the outputs produced under one particular set of (static + dynamic) inputs.
pub struct FilesystemActionCache {
    root: PathBuf,
    compression: CompressionKind,
}

enum BulkOutcome {
    Hit(FileSet),
    DigestMismatch,
    Unreadable(String),
}

impl FilesystemActionCache {
    pub fn new(root: PathBuf, compression: CompressionKind) -> FilesystemActionCache {
        FilesystemActionCache { root, compression }
    }

    fn entry_path(&self, key: &ActionCacheKey) -> PathBuf {
        let (aa, bb) = key.fingerprint().shard_components();
        self.root
            .join(aa)
            .join(bb)
            .join(format!("{}.cache", key.fingerprint().to_hex()))
    }

    fn bulk_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let (cc, dd) = fingerprint.shard_components();
        self.root
            .join(cc)
            .join(dd)
            .join(format!("{}.bulk", fingerprint.to_hex()))
    }

    pub fn cache_key(
        &self,
        artifact: &CacheArtifact,
        input_digests: &[FileDigest],
    ) -> Result<ActionCacheKey, CacheError> {
        Ok(cache_key(artifact, input_digests)?)
    }

    /// Try each stored bulk in order; the first whose recorded digests all still match wins.
    /// Bulks whose archive is missing, unreadable, or disagrees with its own declared outputs
    /// are dropped from the entry on the spot (§4.E's `CacheBulkMismatch` handling), so a
    /// repeated read doesn't keep paying to rediscover the same corruption.
    pub fn cache_read(
        &self,
        key: &ActionCacheKey,
        artifact: &CacheArtifact,
        dest_root: &Path,
        stats: &CacheStats,
    ) -> Result<FileSet, CacheError> {
        let entry_path = self.entry_path(key);
        let bytes = match std::fs::read(&entry_path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(CacheError::Miss),
            Err(e) => return Err(e.into()),
        };
        let mut entry = entry::read_entry_file(&bytes)?;

        let mut dirty = false;
        let mut hit = None;
        let started = Instant::now();
        for bulk in entry.bulks.clone() {
            match self.try_bulk_hit(&bulk, artifact, dest_root, stats) {
                BulkOutcome::Hit(dependency_files) => {
                    hit = Some(dependency_files);
                    break;
                }
                BulkOutcome::DigestMismatch => continue,
                BulkOutcome::Unreadable(msg) => {
                    log::warn!("dropping corrupted bulk {}: {msg}", bulk.path.display());
                    entry.remove_bulk(&bulk.path);
                    dirty = true;
                }
            }
        }

        if hit.is_some() {
            stats.observe(Histogram::ReadTimeMicros, started.elapsed().as_micros() as u64);
            if let Some(bytes) = output_files_total_bytes(artifact, dest_root) {
                stats.observe(Histogram::ReadBytes, bytes);
            }
        }

        if dirty {
            if let Err(e) = self.persist_entry(key, &entry) {
                log::warn!("failed to persist entry after dropping a corrupted bulk: {e}");
            }
        }

        hit.ok_or(CacheError::Miss)
    }

    fn try_bulk_hit(
        &self,
        bulk: &ActionCacheBulk,
        artifact: &CacheArtifact,
        dest_root: &Path,
        stats: &CacheStats,
    ) -> BulkOutcome {
        for (path, expected) in &bulk.digests {
            match hashing::digest_file(path) {
                Ok(digest) if &digest.hash == expected => {}
                Ok(_) => return BulkOutcome::DigestMismatch,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return BulkOutcome::DigestMismatch
                }
                Err(e) => {
                    log::warn!("failed to digest cached input {}: {e}", path.display());
                    return BulkOutcome::DigestMismatch;
                }
            }
        }

        let extracted = match bulk::extract_bulk_archive(&bulk.path, dest_root, Some(stats)) {
            Ok(extracted) => extracted,
            Err(e) => return BulkOutcome::Unreadable(e.to_string()),
        };

        if extracted.sorted() != artifact.output_files.sorted() {
            return BulkOutcome::Unreadable(format!(
                "extracted {} file(s) but {} were declared as outputs",
                extracted.len(),
                artifact.output_files.len()
            ));
        }

        let dependency_files: FileSet = bulk
            .digests
            .iter()
            .filter_map(|(path, _)| Filename::new(path).ok())
            .collect::<FileSet>()
            .difference(&artifact.input_files);

        BulkOutcome::Hit(dependency_files)
    }

    /// Write new outputs into the cache. `file_digests` must cover every file in
    /// `artifact.input_files ∪ artifact.dependency_files`. Idempotent: writing the same
    /// artifact twice leaves the entry with one bulk, not two.
    pub fn cache_write(
        &self,
        key: &ActionCacheKey,
        artifact: &CacheArtifact,
        file_digests: &[FileDigest],
        source_root: &Path,
        gate_on_source_control: bool,
        source_control: &dyn SourceControlQuery,
        stats: &CacheStats,
    ) -> Result<(), CacheError> {
        let combined_files = artifact.input_files.union(&artifact.dependency_files);

        if gate_on_source_control && source_control.any_locally_modified(&combined_files) {
            log::debug!("skipping cache write for {key}: locally modified inputs present");
            return Ok(());
        }

        let mut combined_digests = Vec::with_capacity(combined_files.len());
        for file in combined_files.sorted().iter() {
            let path = file.to_string();
            let digest = file_digests
                .iter()
                .find(|d| d.source.as_path() == file.as_path())
                .ok_or_else(|| CacheError::MissingInputDigest(path.clone()))?;
            combined_digests.push((file.as_path().to_path_buf(), digest.digest.hash));
        }

        let bulk_fingerprint = bulk_digest_fingerprint(key, &combined_digests);
        let bulk_path = self.bulk_path(&bulk_fingerprint);

        let mut entry = match std::fs::read(self.entry_path(key)) {
            Ok(bytes) => entry::read_entry_file(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ActionCacheEntry::default(),
            Err(e) => return Err(e.into()),
        };

        if let Some(existing) = entry.bulks.iter().find(|b| b.path == bulk_path) {
            if existing.digests == combined_digests {
                return Ok(());
            }
        }
        entry.remove_bulk(&bulk_path);

        let mut archive_entries = Vec::with_capacity(artifact.output_files.len());
        let mut file_bytes = Vec::with_capacity(artifact.output_files.len());
        for output in artifact.output_files.iter() {
            let contents = std::fs::read(output.as_path())?;
            let modified = std::fs::metadata(output.as_path())?.modified()?;
            let relative = bulk::entry_name_for(source_root, output)
                .unwrap_or_else(|| output.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
            file_bytes.push((relative, contents, modified));
        }
        for (relative, contents, modified) in &file_bytes {
            archive_entries.push(BulkEntry {
                relative_path: relative.clone(),
                contents,
                modified: *modified,
            });
        }

        let started = Instant::now();
        if let Err(e) = bulk::write_bulk_archive(&bulk_path, &archive_entries, self.compression, Some(stats)) {
            let _ = std::fs::remove_file(&bulk_path);
            return Err(e.into());
        }
        stats.observe(Histogram::WriteTimeMicros, started.elapsed().as_micros() as u64);
        let write_bytes: u64 = file_bytes.iter().map(|(_, contents, _)| contents.len() as u64).sum();
        stats.observe(Histogram::WriteBytes, write_bytes);

        entry.bulks.push(ActionCacheBulk {
            path: bulk_path.clone(),
            digests: combined_digests,
        });

        if let Err(e) = self.persist_entry(key, &entry) {
            let _ = std::fs::remove_file(&bulk_path);
            return Err(e);
        }

        Ok(())
    }

    fn persist_entry(&self, key: &ActionCacheKey, entry: &ActionCacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = entry::write_entry_file(key, entry)?;
        let tmp_path = path.with_extension("cache.tmp");
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// Sum of the restored output files' on-disk sizes, for `Histogram::ReadBytes`. Missing files
/// (shouldn't happen after a successful extraction, but this is observability, not a gate) are
/// silently skipped rather than failing the cache read they're only describing.
fn output_files_total_bytes(artifact: &CacheArtifact, dest_root: &Path) -> Option<u64> {
    let mut total = 0u64;
    for output in artifact.output_files.iter() {
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())?;
        if let Ok(meta) = std::fs::metadata(dest_root.join(name)) {
            total += meta.len();
        }
    }
    Some(total)
}

fn bulk_digest_fingerprint(key: &ActionCacheKey, digests: &[(PathBuf, Fingerprint)]) -> Fingerprint {
    let mut sink = FingerprintSink::new(key.fingerprint().as_bytes());
    sink.update_u64(digests.len() as u64);
    for (path, fingerprint) in digests {
        sink.update_str(&path.to_string_lossy());
        sink.update_fingerprint(fingerprint);
    }
    sink.finish()
}
