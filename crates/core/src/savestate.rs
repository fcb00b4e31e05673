//! Save state for the PWM core.
//!
//! Captures every live register so a run can be resumed cycle for cycle.
//! State is serialized with bincode and deflate-compressed.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "QPWM"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Magic bytes identifying a save state file.
const MAGIC: &[u8; 4] = b"QPWM";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[must_use]
pub enum Error {
    #[error("{context} {path:?}: {source}")]
    Io {
        path: PathBuf,
        context: &'static str,
        source: std::io::Error,
    },
    #[error("invalid save state header: {0}")]
    InvalidHeader(String),
    #[error("unsupported save state version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("failed to decompress save state: {0}")]
    Decompress(String),
    #[error("save state encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
}

// ─── Per-component state structs ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescalerState {
    pub count: u8,
    pub last_select: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetState {
    pub asserted: bool,
    pub held: u32,
}

// ─── Top-level save state ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub cycle: u64,
    pub duty: [u8; 4],
    pub counter: u8,
    pub prescaler: PrescalerState,
    pub reset: ResetState,
    pub config: Config,
}

// ─── Encoding and file I/O ──────────────────────────────────────────────────

/// Encode a state with header and deflate compression.
pub fn encode(state: &SaveState) -> Result<Vec<u8>> {
    let payload = bincode::serialize(state)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decode a state, verifying magic and version.
pub fn decode(data: &[u8]) -> Result<SaveState> {
    if data.len() < HEADER_LEN {
        return Err(Error::InvalidHeader("file too small".into()));
    }
    if &data[0..4] != MAGIC {
        return Err(Error::InvalidHeader(format!(
            "bad magic (expected {MAGIC:?}, found {:?})",
            &data[0..4]
        )));
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(Error::Version { found: version, expected: FORMAT_VERSION });
    }

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| Error::Decompress(format!("{e:?}")))?;

    Ok(bincode::deserialize(&decompressed)?)
}

pub fn save_to_file(state: &SaveState, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let data = encode(state)?;
    std::fs::write(path, &data).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        context: "failed to write save state",
        source,
    })?;
    debug!(?path, bytes = data.len(), cycle = state.cycle, "saved state");
    Ok(())
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<SaveState> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        context: "failed to read save state",
        source,
    })?;
    let state = decode(&data)?;
    debug!(?path, cycle = state.cycle, "loaded state");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SaveState {
        SaveState {
            cycle: 12345,
            duty: [0, 64, 128, 255],
            counter: 77,
            prescaler: PrescalerState { count: 5, last_select: 3 },
            reset: ResetState { asserted: false, held: 10 },
            config: Config::default(),
        }
    }

    #[test]
    fn test_encode_decode() {
        let state = sample_state();
        let bytes = encode(&state).unwrap();
        assert_eq!(&bytes[0..4], b"QPWM");
        assert_eq!(decode(&bytes).unwrap(), state);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode(&sample_state()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(Error::InvalidHeader(_))));
        assert!(matches!(decode(b"QPW"), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_rejects_future_version() {
        let mut bytes = encode(&sample_state()).unwrap();
        bytes[4] = 9;
        assert!(matches!(decode(&bytes), Err(Error::Version { found: 9, .. })));
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("quadpwm-savestate-{}.qps", std::process::id()));
        let state = sample_state();
        save_to_file(&state, &path).unwrap();
        let loaded = load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, state);
    }
}
