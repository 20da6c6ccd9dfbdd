// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashing::Fingerprint;

use crate::key::ActionCacheKey;

/// Tags every entry file so a reader can tell this cache's own format from garbage (or a
/// future incompatible version) before trying to interpret the bytes that follow.
const ENTRY_ARCHIVE_TAG: &[u8; 4] = b"ACE1";
const ENTRY_FORMAT_VERSION: u8 = 1;

#[derive(Debug)]
pub enum EntryCodecError {
    Io(std::io::Error),
    BadArchiveTag,
    UnsupportedVersion(u8),
}

impl fmt::Display for EntryCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryCodecError::Io(e) => write!(f, "i/o error: {e}"),
            EntryCodecError::BadArchiveTag => write!(f, "not an action cache entry file"),
            EntryCodecError::UnsupportedVersion(v) => {
                write!(f, "entry file format version {v} is not supported")
            }
        }
    }
}

impl std::error::Error for EntryCodecError {}

impl From<std::io::Error> for EntryCodecError {
    fn from(e: std::io::Error) -> EntryCodecError {
        EntryCodecError::Io(e)
    }
}

/// One observed set of (input ∪ dependency) file digests for a given action key, and the
/// archive that holds the outputs produced under that set.
#[derive(Clone, Debug)]
pub struct ActionCacheBulk {
    pub path: PathBuf,
    pub digests: Vec<(PathBuf, Fingerprint)>,
}

/// All bulks observed so far for one action key. Bulks are appended, never removed in place —
/// `ActionCacheEntry::remove_bulk` is the one exception, used to drop a bulk whose archive has
/// gone missing or stopped matching its own recorded digests.
#[derive(Clone, Debug, Default)]
pub struct ActionCacheEntry {
    pub bulks: Vec<ActionCacheBulk>,
}

impl ActionCacheEntry {
    pub fn remove_bulk(&mut self, path: &std::path::Path) {
        self.bulks.retain(|b| b.path != path);
    }
}

/// Serialize `entry` (§6.2's field layout: fingerprint, bulk count, then each bulk's path and
/// digest list) and wrap it with the archive tag, version byte, and a deflate pass — the entry
/// file is compressed exactly the way a bulk archive's members are, just with a simpler
/// container since there's only ever one logical record per file.
pub fn write_entry_file(
    key: &ActionCacheKey,
    entry: &ActionCacheEntry,
) -> Result<Vec<u8>, EntryCodecError> {
    let mut plain = Vec::new();
    plain.write_all(key.fingerprint().as_bytes())?;
    plain.write_u32::<LittleEndian>(entry.bulks.len() as u32)?;
    for bulk in &entry.bulks {
        write_filename(&mut plain, &bulk.path)?;
        plain.write_u32::<LittleEndian>(bulk.digests.len() as u32)?;
        for (path, fingerprint) in &bulk.digests {
            write_filename(&mut plain, path)?;
            plain.write_all(fingerprint.as_bytes())?;
        }
    }

    let mut compressed = flate2_encoder(&plain)?;

    let mut out = Vec::with_capacity(compressed.len() + 5);
    out.extend_from_slice(ENTRY_ARCHIVE_TAG);
    out.push(ENTRY_FORMAT_VERSION);
    out.append(&mut compressed);
    Ok(out)
}

pub fn read_entry_file(bytes: &[u8]) -> Result<ActionCacheEntry, EntryCodecError> {
    if bytes.len() < 5 || &bytes[0..4] != ENTRY_ARCHIVE_TAG {
        return Err(EntryCodecError::BadArchiveTag);
    }
    let version = bytes[4];
    if version != ENTRY_FORMAT_VERSION {
        return Err(EntryCodecError::UnsupportedVersion(version));
    }

    let plain = flate2_decoder(&bytes[5..])?;
    let mut cursor = std::io::Cursor::new(plain);

    let mut fingerprint_bytes = [0u8; hashing::FINGERPRINT_SIZE];
    cursor.read_exact(&mut fingerprint_bytes)?;
    // The key fingerprint is re-derived by the caller from the lookup path, not trusted here;
    // reading past it keeps the cursor aligned with the rest of the record.
    let bulk_count = cursor.read_u32::<LittleEndian>()?;

    let mut bulks = Vec::with_capacity(bulk_count as usize);
    for _ in 0..bulk_count {
        let path = read_filename(&mut cursor)?;
        let digest_count = cursor.read_u32::<LittleEndian>()?;
        let mut digests = Vec::with_capacity(digest_count as usize);
        for _ in 0..digest_count {
            let source = read_filename(&mut cursor)?;
            let mut fp_bytes = [0u8; hashing::FINGERPRINT_SIZE];
            cursor.read_exact(&mut fp_bytes)?;
            digests.push((source, Fingerprint::from_bytes_unsafe(&fp_bytes)));
        }
        bulks.push(ActionCacheBulk { path, digests });
    }

    Ok(ActionCacheEntry { bulks })
}

fn write_filename(out: &mut Vec<u8>, path: &std::path::Path) -> Result<(), EntryCodecError> {
    let path_str = path.to_string_lossy();
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    out.write_u16::<LittleEndian>(path_str.len() as u16)?;
    out.write_all(path_str.as_bytes())?;
    out.write_u16::<LittleEndian>(basename.len() as u16)?;
    out.write_all(basename.as_bytes())?;
    Ok(())
}

fn read_filename(cursor: &mut std::io::Cursor<Vec<u8>>) -> Result<PathBuf, EntryCodecError> {
    let path_len = cursor.read_u16::<LittleEndian>()? as usize;
    let mut path_bytes = vec![0u8; path_len];
    cursor.read_exact(&mut path_bytes)?;
    let basename_len = cursor.read_u16::<LittleEndian>()? as usize;
    let mut basename_bytes = vec![0u8; basename_len];
    cursor.read_exact(&mut basename_bytes)?;
    // The basename is redundant with the full path and only kept for wire compatibility;
    // discard it once read.
    Ok(PathBuf::from(String::from_utf8_lossy(&path_bytes).into_owned()))
}

fn flate2_encoder(plain: &[u8]) -> Result<Vec<u8>, EntryCodecError> {
    use std::io::Write as _;
    let mut encoder =
        flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(plain)?;
    Ok(encoder.finish()?)
}

fn flate2_decoder(compressed: &[u8]) -> Result<Vec<u8>, EntryCodecError> {
    let mut decoder = flate2::write::DeflateDecoder::new(Vec::new());
    decoder.write_all(compressed)?;
    Ok(decoder.finish()?)
}
