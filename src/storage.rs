//! Append-only text logs for the commitment set and consumed nullifiers.
//!
//! Both files hold one record per line in lowercase hex so they can be
//! inspected and diffed by hand. Records are only ever appended.

use crate::error::{Result, SignalError};
use crate::utils::{field_to_hex, parse_field_hex, FieldElement};
use log::warn;
use std::fs;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

fn storage_error(what: &str, path: &Path, e: impl std::fmt::Display) -> SignalError {
    SignalError::Storage(format!("{what} {}: {e}", path.display()))
}

fn open_log(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| storage_error("Failed to create directory for", path, e))?;
    }
    fs::OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| storage_error("Failed to open", path, e))
}

fn read_records(path: &Path) -> Result<Vec<(usize, String)>> {
    let file = open_log(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| storage_error("Failed to read line from", path, e))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            records.push((i + 1, trimmed.to_lowercase()));
        }
    }
    Ok(records)
}

fn ends_with_newline(file: &mut fs::File, len: u64) -> std::io::Result<bool> {
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Appends one line. On failure the file is cut back to its previous length,
/// so a record is either fully durable or absent.
fn append_record(path: &Path, record: &str) -> Result<()> {
    let mut file = open_log(path)?;
    let len = file
        .metadata()
        .map_err(|e| storage_error("Failed to stat", path, e))?
        .len();
    let terminated = ends_with_newline(&mut file, len)
        .map_err(|e| storage_error("Failed to read tail of", path, e))?;

    let mut line = String::with_capacity(record.len() + 2);
    if !terminated {
        line.push('\n');
    }
    line.push_str(record);
    line.push('\n');

    let written = file
        .write_all(line.as_bytes())
        .and_then(|()| file.sync_data());
    if let Err(e) = written {
        if let Err(truncate) = file.set_len(len) {
            warn!("Failed to roll back {}: {truncate}", path.display());
        }
        return Err(storage_error("Failed to write record to", path, e));
    }
    Ok(())
}

fn parse_line(path: &Path, line_no: usize, value: &str) -> Result<FieldElement> {
    parse_field_hex(value).map_err(|e| {
        SignalError::Storage(format!("{}:{line_no}: {e}", path.display()))
    })
}

/// Ordered log of identity commitments, one per line.
#[derive(Debug, Clone)]
pub struct CommitmentLog {
    path: PathBuf,
}

impl CommitmentLog {
    /// Opens (creating if needed) the log at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        open_log(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// All commitments in append order.
    pub fn load(&self) -> Result<Vec<FieldElement>> {
        read_records(&self.path)?
            .into_iter()
            .map(|(line_no, value)| parse_line(&self.path, line_no, &value))
            .collect()
    }

    pub fn append(&self, commitment: FieldElement) -> Result<()> {
        append_record(&self.path, &field_to_hex(commitment))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Log of consumed `(external_nullifier, nullifier_hash)` pairs.
///
/// Each line is `<external_nullifier>:<nullifier_hash>`.
#[derive(Debug, Clone)]
pub struct NullifierLog {
    path: PathBuf,
}

impl NullifierLog {
    pub fn open(path: &Path) -> Result<Self> {
        open_log(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn load(&self) -> Result<Vec<(FieldElement, FieldElement)>> {
        read_records(&self.path)?
            .into_iter()
            .map(|(line_no, record)| {
                let (external, nullifier) = record.split_once(':').ok_or_else(|| {
                    SignalError::Storage(format!(
                        "{}:{line_no}: expected '<external_nullifier>:<nullifier_hash>'",
                        self.path.display()
                    ))
                })?;
                Ok((
                    parse_line(&self.path, line_no, external)?,
                    parse_line(&self.path, line_no, nullifier)?,
                ))
            })
            .collect()
    }

    pub fn append(&self, external_nullifier: FieldElement, nullifier_hash: FieldElement) -> Result<()> {
        let record = format!(
            "{}:{}",
            field_to_hex(external_nullifier),
            field_to_hex(nullifier_hash)
        );
        append_record(&self.path, &record)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
