// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use action_model::{FileSet, Filename};
use cache_stats::{CacheStats, Histogram};

/// Which real compressor backs a bulk archive. The ZIP container itself always uses
/// `CompressionMethod::Stored` — compression happens ourselves, in-band, so that the codec can
/// be one the `zip` crate's own enum doesn't know how to register, matching the two method ids
/// this cache has historically used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressionKind {
    Lz4,
    Zstd,
}

impl CompressionKind {
    /// The WinZip/custom method id this cache tags each entry's compressed stream with.
    fn method_id(self) -> u16 {
        match self {
            CompressionKind::Lz4 => 0xFFFF,
            CompressionKind::Zstd => 93,
        }
    }

    fn from_method_id(id: u16) -> Result<CompressionKind, BulkError> {
        match id {
            0xFFFF => Ok(CompressionKind::Lz4),
            93 => Ok(CompressionKind::Zstd),
            other => Err(BulkError::UnknownCompressionMethod(other)),
        }
    }

    fn compress(self, bytes: &[u8]) -> Result<Vec<u8>, BulkError> {
        match self {
            CompressionKind::Lz4 => {
                let mut encoder = lz4::EncoderBuilder::new()
                    .build(Vec::new())
                    .map_err(|e| BulkError::Codec(e.to_string()))?;
                encoder
                    .write_all(bytes)
                    .map_err(|e| BulkError::Codec(e.to_string()))?;
                let (out, result) = encoder.finish();
                result.map_err(|e| BulkError::Codec(e.to_string()))?;
                Ok(out)
            }
            CompressionKind::Zstd => {
                zstd::encode_all(bytes, 0).map_err(|e| BulkError::Codec(e.to_string()))
            }
        }
    }

    fn decompress(self, bytes: &[u8]) -> Result<Vec<u8>, BulkError> {
        match self {
            CompressionKind::Lz4 => {
                let mut decoder =
                    lz4::Decoder::new(bytes).map_err(|e| BulkError::Codec(e.to_string()))?;
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| BulkError::Codec(e.to_string()))?;
                Ok(out)
            }
            CompressionKind::Zstd => {
                zstd::decode_all(bytes).map_err(|e| BulkError::Codec(e.to_string()))
            }
        }
    }
}

#[derive(Debug)]
pub enum BulkError {
    Io(std::io::Error),
    Zip(zip::result::ZipError),
    Codec(String),
    UnknownCompressionMethod(u16),
    UnsafeEntryPath(String),
    OutputMismatch { expected: usize, extracted: usize },
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BulkError::Io(e) => write!(f, "i/o error: {e}"),
            BulkError::Zip(e) => write!(f, "zip error: {e}"),
            BulkError::Codec(msg) => write!(f, "compression codec error: {msg}"),
            BulkError::UnknownCompressionMethod(id) => {
                write!(f, "bulk entry used unrecognized compression method id {id}")
            }
            BulkError::UnsafeEntryPath(path) => {
                write!(f, "refusing to extract entry with unsafe path: {path}")
            }
            BulkError::OutputMismatch { expected, extracted } => write!(
                f,
                "extracted {extracted} file(s) but {expected} were declared as outputs"
            ),
        }
    }
}

impl std::error::Error for BulkError {}

impl From<std::io::Error> for BulkError {
    fn from(e: std::io::Error) -> BulkError {
        BulkError::Io(e)
    }
}

impl From<zip::result::ZipError> for BulkError {
    fn from(e: zip::result::ZipError) -> BulkError {
        BulkError::Zip(e)
    }
}

/// One file to be archived: its path relative to `source_root`, its bytes, and the
/// modification time to preserve.
pub struct BulkEntry<'a> {
    pub relative_path: String,
    pub contents: &'a [u8],
    pub modified: SystemTime,
}

/// Write `entries` into a fresh bulk archive at `path`, compressing every entry's bytes with
/// `kind`. Writes to a temporary sibling file first so a reader never observes a partial
/// archive at the real path. When `stats` is given, each entry's compression pass is timed and
/// sized into the `Deflate*` histograms (the generic name this cache uses for "the compression
/// step", regardless of which `CompressionKind` actually ran).
pub fn write_bulk_archive(
    path: &Path,
    entries: &[BulkEntry<'_>],
    kind: CompressionKind,
    stats: Option<&CacheStats>,
) -> Result<(), BulkError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("bulk.tmp");
    {
        let file = File::create(&tmp_path)?;
        let mut writer = ZipWriter::new(file);
        for entry in entries {
            let options = FileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .last_modified_time(zip_datetime_from_system_time(entry.modified));
            writer.start_file(entry.relative_path.clone(), options)?;
            writer.write_u16::<LittleEndian>(kind.method_id())?;

            let started = Instant::now();
            let compressed = kind.compress(entry.contents)?;
            if let Some(stats) = stats {
                stats.observe(Histogram::DeflateTimeMicros, started.elapsed().as_micros() as u64);
                stats.observe(Histogram::DeflateBytes, compressed.len() as u64);
            }

            writer.write_all(&compressed)?;
        }
        writer.finish()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Extract every entry of the bulk archive at `path` into `dest_root`, rejecting any entry
/// whose name would escape it (`UnsafeEntryPath`). Returns the set of files written. When
/// `stats` is given, each entry's decompression pass feeds the `Inflate*` histograms.
pub fn extract_bulk_archive(
    path: &Path,
    dest_root: &Path,
    stats: Option<&CacheStats>,
) -> Result<FileSet, BulkError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut extracted = FileSet::new();

    for i in 0..archive.len() {
        let mut zip_entry = archive.by_index(i)?;
        let name = zip_entry.name().to_owned();
        reject_unsafe_entry_path(&name)?;

        let mut raw = Vec::with_capacity(zip_entry.size() as usize + 2);
        zip_entry.read_to_end(&mut raw)?;
        if raw.len() < 2 {
            return Err(BulkError::Codec(format!("entry {name} is too short to carry a method tag")));
        }
        let mut cursor = Cursor::new(&raw[..2]);
        let method_id = cursor.read_u16::<LittleEndian>()?;
        let kind = CompressionKind::from_method_id(method_id)?;

        let started = Instant::now();
        let plain = kind.decompress(&raw[2..])?;
        if let Some(stats) = stats {
            stats.observe(Histogram::InflateTimeMicros, started.elapsed().as_micros() as u64);
            stats.observe(Histogram::InflateBytes, plain.len() as u64);
        }

        let dest_path = dest_root.join(&name);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&dest_path, &plain)?;
        extracted.insert(Filename::new(&dest_path).unwrap_or_else(|_| {
            Filename::resolve(dest_root, Path::new(&name))
        }));
    }

    Ok(extracted)
}

fn reject_unsafe_entry_path(name: &str) -> Result<(), BulkError> {
    let path = Path::new(name);
    if path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(BulkError::UnsafeEntryPath(name.to_owned()));
    }
    Ok(())
}

/// Relativize `file` against `source_root` for use as a bulk entry name.
pub fn entry_name_for(source_root: &Path, file: &Filename) -> Option<String> {
    file.as_path()
        .strip_prefix(source_root)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

/// Converts a wall-clock time to the MS-DOS date/time pair ZIP stores, clamping to ZIP's
/// representable range (1980-2107) rather than failing on out-of-range timestamps.
fn zip_datetime_from_system_time(time: SystemTime) -> zip::DateTime {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let days = secs / 86_400;
    let time_of_day = secs % 86_400;
    let (year, month, day) = civil_from_days(days as i64);
    let hour = (time_of_day / 3600) as u32;
    let minute = ((time_of_day % 3600) / 60) as u32;
    let second = (time_of_day % 60) as u32;

    let year = year.clamp(1980, 2107) as u16;
    zip::DateTime::from_date_and_time(
        year,
        month as u8,
        day as u8,
        hour as u8,
        minute as u8,
        second as u8,
    )
        .unwrap_or_else(|_| zip::DateTime::default())
}

/// Howard Hinnant's `civil_from_days`: days-since-epoch to a proleptic Gregorian `(y, m, d)`.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_lz4_compressed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bulk_path = dir.path().join("x.bulk");
        let entries = vec![BulkEntry {
            relative_path: "a.o".to_owned(),
            contents: b"object file bytes",
            modified: SystemTime::now(),
        }];
        write_bulk_archive(&bulk_path, &entries, CompressionKind::Lz4, None).unwrap();

        let dest = dir.path().join("out");
        let extracted = extract_bulk_archive(&bulk_path, &dest, None).unwrap();
        assert_eq!(extracted.len(), 1);
        let written = std::fs::read(dest.join("a.o")).unwrap();
        assert_eq!(written, b"object file bytes");
    }

    #[test]
    fn round_trips_zstd_compressed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bulk_path = dir.path().join("x.bulk");
        let entries = vec![BulkEntry {
            relative_path: "a.o".to_owned(),
            contents: b"object file bytes",
            modified: SystemTime::now(),
        }];
        write_bulk_archive(&bulk_path, &entries, CompressionKind::Zstd, None).unwrap();

        let dest = dir.path().join("out");
        let extracted = extract_bulk_archive(&bulk_path, &dest, None).unwrap();
        assert_eq!(extracted.len(), 1);
        let written = std::fs::read(dest.join("a.o")).unwrap();
        assert_eq!(written, b"object file bytes");
    }

    #[test]
    fn rejects_zip_slip_entries() {
        let dir = tempfile::tempdir().unwrap();
        let bulk_path = dir.path().join("evil.bulk");
        {
            let file = File::create(&bulk_path).unwrap();
            let mut writer = ZipWriter::new(file);
            let options = FileOptions::default().compression_method(CompressionMethod::Stored);
            writer.start_file("../etc/passwd", options).unwrap();
            writer.write_u16::<LittleEndian>(0xFFFF).unwrap();
            writer.write_all(&CompressionKind::Lz4.compress(b"pwned").unwrap()).unwrap();
            writer.finish().unwrap();
        }

        let dest = dir.path().join("out");
        let err = extract_bulk_archive(&bulk_path, &dest, None).unwrap_err();
        assert!(matches!(err, BulkError::UnsafeEntryPath(_)));
    }
}
