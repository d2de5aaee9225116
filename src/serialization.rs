//! Persistence of fitted artifacts.
//!
//! Fitted transformers, encoder state and the classifier are plain numerical
//! data with `serde` derives. Binary blobs go through `bincode`; the feature
//! schema is JSON so it can be inspected by hand.

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// A parameter representation that can be serialized to and from bytes.
pub trait SerializableParams: Sized {
    /// Serialize the parameters into a byte buffer.
    fn to_bytes(&self) -> Result<Vec<u8>>;

    /// Deserialize the parameters from a byte buffer.
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

impl<T> SerializableParams for T
where
    T: Serialize + DeserializeOwned,
{
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Write `value` as a bincode blob, creating parent directories.
pub fn save_bincode<T: Serialize + DeserializeOwned>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, value.to_bytes()?)?;
    Ok(())
}

/// Read a bincode blob. A missing file is [`PipelineError::MissingArtifact`];
/// an undecodable one is [`PipelineError::CorruptArtifact`].
pub fn load_bincode<T: Serialize + DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_artifact(path)?;
    T::from_bytes(&bytes).map_err(|e| PipelineError::CorruptArtifact {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

/// Read a JSON artifact with the same error mapping as [`load_bincode`].
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = read_artifact(path)?;
    serde_json::from_slice(&bytes).map_err(|e| PipelineError::CorruptArtifact {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn read_artifact(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PipelineError::MissingArtifact(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
