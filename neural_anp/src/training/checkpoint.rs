//! Checkpoint save/load for trained models.
//!
//! A checkpoint is a directory holding:
//! - `config.json`: the [`AnpConfig`] the model was built from
//! - `metadata.json`: training progress
//! - `params.bin`: every named parameter tensor, little-endian

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use burn::config::Config;
use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::AnpConfig;
use crate::error::{AnpError, Result};
use crate::model::AnpModel;
use crate::params::{num_values, ParamTensor, ParameterMap};

const PARAMS_MAGIC: &[u8; 4] = b"ANPP";
const PARAMS_VERSION: u32 = 1;

const CONFIG_FILE: &str = "config.json";
const METADATA_FILE: &str = "metadata.json";
const PARAMS_FILE: &str = "params.bin";

/// Checkpoint metadata stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Current epoch.
    pub epoch: usize,
    /// Total training steps.
    pub total_steps: usize,
    /// Best loss achieved, if any step has run.
    #[serde(default)]
    pub best_loss: Option<f32>,
    /// Running average loss.
    #[serde(default)]
    pub avg_loss: f32,
    /// Number of scalar parameters in the model.
    #[serde(default)]
    pub num_parameters: usize,
    /// Checkpoint version for compatibility.
    pub version: u32,
}

impl Default for CheckpointMetadata {
    fn default() -> Self {
        Self {
            epoch: 0,
            total_steps: 0,
            best_loss: None,
            avg_loss: 0.0,
            num_parameters: 0,
            version: PARAMS_VERSION,
        }
    }
}

impl CheckpointMetadata {
    /// Create metadata from training state.
    pub fn new(epoch: usize, total_steps: usize, best_loss: f32, avg_loss: f32) -> Self {
        Self {
            epoch,
            total_steps,
            best_loss: best_loss.is_finite().then_some(best_loss),
            avg_loss,
            ..Default::default()
        }
    }

    /// Parse metadata from JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Convert metadata to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Serialize a parameter mapping.
///
/// Layout: magic `ANPP`, u32 version, u32 entry count, then per entry a u32
/// name length, UTF-8 name, u32 rank, u64 dims and f32 values. All integers
/// and floats are little-endian.
pub fn write_parameters<W: Write>(writer: &mut W, params: &ParameterMap) -> Result<()> {
    writer.write_all(PARAMS_MAGIC)?;
    writer.write_all(&PARAMS_VERSION.to_le_bytes())?;
    writer.write_all(&len_u32(params.len(), "parameter count")?.to_le_bytes())?;

    for (name, tensor) in params {
        writer.write_all(&len_u32(name.len(), "parameter name")?.to_le_bytes())?;
        writer.write_all(name.as_bytes())?;
        writer.write_all(&len_u32(tensor.shape.len(), "tensor rank")?.to_le_bytes())?;
        for &dim in &tensor.shape {
            writer.write_all(&(dim as u64).to_le_bytes())?;
        }
        let bytes: Vec<u8> = tensor.values.iter().flat_map(|v| v.to_le_bytes()).collect();
        writer.write_all(&bytes)?;
    }

    Ok(())
}

/// Deserialize a parameter mapping written by [`write_parameters`].
pub fn read_parameters<R: Read>(reader: &mut R) -> Result<ParameterMap> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != PARAMS_MAGIC {
        return Err(AnpError::InvalidData("not a parameter file".into()));
    }
    let version = read_u32(reader)?;
    if version != PARAMS_VERSION {
        return Err(AnpError::InvalidData(format!(
            "unsupported parameter file version {version}"
        )));
    }

    let count = read_u32(reader)? as usize;
    let mut params = ParameterMap::new();
    for _ in 0..count {
        let name_len = read_u32(reader)? as usize;
        let name = read_bytes(reader, name_len, "parameter name")?;
        let name = String::from_utf8(name)
            .map_err(|e| AnpError::InvalidData(format!("parameter name: {e}")))?;

        let rank = read_u32(reader)? as usize;
        let mut shape = Vec::new();
        for _ in 0..rank {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            let dim = usize::try_from(u64::from_le_bytes(buf))
                .map_err(|_| AnpError::InvalidData(format!("{name}: dimension overflow")))?;
            shape.push(dim);
        }

        let byte_len = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .and_then(|len| len.checked_mul(4))
            .ok_or_else(|| AnpError::InvalidData(format!("{name}: shape overflow")))?;
        let bytes = read_bytes(reader, byte_len, &name)?;
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        if params
            .insert(name.clone(), ParamTensor { shape, values })
            .is_some()
        {
            return Err(AnpError::InvalidData(format!("duplicate parameter {name}")));
        }
    }

    Ok(params)
}

fn len_u32(len: usize, what: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| AnpError::InvalidData(format!("{what} too large: {len}")))
}

/// Read exactly `len` bytes without trusting `len` for the allocation size.
fn read_bytes<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(u64::try_from(len).unwrap_or(u64::MAX))
        .read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(AnpError::InvalidData(format!(
            "{what}: expected {len} bytes, found {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Save a model checkpoint to a directory.
///
/// # Arguments
/// * `dir` - Directory to save checkpoint to (created if needed)
/// * `model` - Model whose parameters are written
/// * `config` - Configuration the model was built from
/// * `metadata` - Checkpoint metadata
pub fn save_checkpoint<B: Backend>(
    dir: &Path,
    model: &AnpModel<B>,
    config: &AnpConfig,
    metadata: &CheckpointMetadata,
) -> Result<()> {
    fs::create_dir_all(dir)?;

    let params = model.parameters()?;
    let metadata = CheckpointMetadata {
        num_parameters: num_values(&params),
        ..metadata.clone()
    };

    fs::write(dir.join(METADATA_FILE), metadata.to_json()?)?;
    config.save(dir.join(CONFIG_FILE))?;

    let mut writer = BufWriter::new(File::create(dir.join(PARAMS_FILE))?);
    write_parameters(&mut writer, &params)?;
    writer.flush()?;

    log::info!(
        "Saved checkpoint to {:?} (epoch {}, {} tensors, {} values)",
        dir,
        metadata.epoch,
        params.len(),
        metadata.num_parameters
    );

    Ok(())
}

/// Load a model checkpoint from a directory.
///
/// Rebuilds the model from `config.json` and restores every parameter.
///
/// # Returns
/// (model, config, metadata)
pub fn load_checkpoint<B: Backend>(
    dir: &Path,
    device: &B::Device,
) -> Result<(AnpModel<B>, AnpConfig, CheckpointMetadata)> {
    let metadata = CheckpointMetadata::from_json(&fs::read_to_string(dir.join(METADATA_FILE))?)?;

    let config = AnpConfig::load(dir.join(CONFIG_FILE))
        .map_err(|e| AnpError::InvalidData(format!("{CONFIG_FILE}: {e}")))?;

    let mut reader = BufReader::new(File::open(dir.join(PARAMS_FILE))?);
    let params = read_parameters(&mut reader)?;

    let mut model = config.init::<B>(device)?;
    model.load_parameters(&params)?;

    log::info!(
        "Loaded checkpoint from {:?} (epoch {}, {} tensors)",
        dir,
        metadata.epoch,
        params.len()
    );

    Ok((model, config, metadata))
}

/// Check if a valid checkpoint exists at the given path.
pub fn checkpoint_exists(dir: &Path) -> bool {
    [CONFIG_FILE, METADATA_FILE, PARAMS_FILE]
        .iter()
        .all(|file| dir.join(file).exists())
}

/// Get the latest checkpoint from a series of numbered checkpoints.
///
/// Looks for directories named `checkpoint_N` where N is an epoch number.
pub fn find_latest_checkpoint(base_dir: &Path) -> Option<PathBuf> {
    fs::read_dir(base_dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && checkpoint_exists(path))
        .filter_map(|path| {
            let epoch = path
                .file_name()?
                .to_str()?
                .strip_prefix("checkpoint_")?
                .parse::<usize>()
                .ok()?;
            Some((epoch, path))
        })
        .max_by_key(|(epoch, _)| *epoch)
        .map(|(_, path)| path)
}
