use std::fs;
use std::io::{self, Read, Write};

use camino::Utf8Path;
use tempfile::NamedTempFile;

use crate::error::PublishError;

/// Streams `reader` into `destination` through a temp file in the same
/// directory. The destination only appears once every byte has been synced;
/// on error the temp file is removed and an existing destination is left as
/// it was.
pub fn write_stream_atomic(reader: &mut dyn Read, destination: &Utf8Path) -> io::Result<u64> {
    let parent = destination
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent"))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".rb-publish")
        .tempfile_in(parent.as_std_path())?;
    let written = io::copy(reader, &mut temp)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    persist(temp, destination)?;
    Ok(written)
}

pub fn write_bytes_atomic(destination: &Utf8Path, content: &[u8]) -> Result<(), PublishError> {
    let mut reader = content;
    write_stream_atomic(&mut reader, destination)
        .map(|_| ())
        .map_err(|err| PublishError::Filesystem(format!("write {destination}: {err}")))
}

pub fn write_json_pretty<T: serde::Serialize>(
    destination: &Utf8Path,
    value: &T,
) -> Result<(), PublishError> {
    let content = serde_json::to_vec_pretty(value)
        .map_err(|err| PublishError::Filesystem(err.to_string()))?;
    write_bytes_atomic(destination, &content)
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), PublishError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| PublishError::Filesystem(format!("create {path}: {err}")))
}

pub fn file_size(path: &Utf8Path) -> io::Result<u64> {
    fs::metadata(path.as_std_path()).map(|meta| meta.len())
}

pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let value = bytes as f64;
    if value >= GB {
        format!("{:.1} GB", value / GB)
    } else if value >= MB {
        format!("{:.1} MB", value / MB)
    } else if value >= KB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{bytes} B")
    }
}

fn persist(temp: NamedTempFile, destination: &Utf8Path) -> io::Result<()> {
    temp.persist(destination.as_std_path())
        .map(|_| ())
        .map_err(|err| err.error)
}
