//! Bincode helpers shared by the on-disk formats.
//!
//! All blobs use bincode's `DefaultOptions`, which writes integers with a
//! variable-length encoding. Small ids and offsets (the vast majority in a
//! suffix array or alignment file) take one or two bytes.
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{BitextError, Result};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
}

/// Serialize `value` to `path`.
pub(crate) fn save_blob<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| BitextError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    options()
        .serialize_into(&mut writer, value)
        .map_err(|e| BitextError::codec(path, e))?;
    writer.flush().map_err(|e| BitextError::io(path, e))?;
    Ok(())
}

/// Deserialize a value previously written by [`save_blob`].
pub(crate) fn load_blob<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| BitextError::io(path, e))?;
    let reader = BufReader::new(file);
    options()
        .deserialize_from(reader)
        .map_err(|e| BitextError::codec(path, e))
}

/// Append `suffix` to a path prefix without inserting a separator
/// (`/data/ep.` + `en.mct` -> `/data/ep.en.mct`).
pub(crate) fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = prefix.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}
