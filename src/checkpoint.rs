//! Checkpoint Persistence
//!
//! Saves a model's configuration and every learned tensor to a single binary
//! file, and rebuilds the model from it.
//!
//! ## Format (version 1)
//!
//! All integers are little-endian `u32`, all values little-endian `f32`.
//!
//! ```text
//! "PUCK_CKPT"                      magic
//! u8                               version
//! u32 len, [u8; len]               ModelConfig as JSON
//! u32 count                        number of tensors
//! count × {
//!     u32 len, [u8; len]           parameter name (UTF-8)
//!     u32 ndim, [u32; ndim]        shape
//!     u32 n, [f32; n]              data
//! }
//! ```
//!
//! Tensors are written in [`LanguageModel::parameters`] order, but loading
//! matches them by name. A file with a missing, extra or mis-shaped tensor
//! is rejected.

use crate::config::ModelConfig;
use crate::error::{PuckError, Result};
use crate::model::LanguageModel;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8] = b"PUCK_CKPT";
const VERSION: u8 = 1;

/// Save `model` to `path`
pub fn save(model: &LanguageModel, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_to(model, &mut writer)?;
    writer.flush()?;
    log::info!(
        "Saved checkpoint with {} parameters to {}",
        model.count_parameters(),
        path.as_ref().display()
    );
    Ok(())
}

/// Load a model saved by [`save`]
pub fn load(path: impl AsRef<Path>) -> Result<LanguageModel> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let model = read_from(&mut reader)?;
    log::info!(
        "Loaded checkpoint with {} parameters from {}",
        model.count_parameters(),
        path.as_ref().display()
    );
    Ok(model)
}

/// Serialize a model to any writer
pub fn write_to<W: Write>(model: &LanguageModel, writer: &mut W) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&[VERSION])?;

    let config_json = serde_json::to_vec(model.config())?;
    write_u32(writer, config_json.len())?;
    writer.write_all(&config_json)?;

    let params = model.parameters();
    write_u32(writer, params.len())?;
    for (name, tensor) in params {
        write_u32(writer, name.len())?;
        writer.write_all(name.as_bytes())?;
        write_tensor(writer, tensor)?;
    }
    Ok(())
}

/// Deserialize a model from any reader
pub fn read_from<R: Read>(reader: &mut R) -> Result<LanguageModel> {
    let mut magic = [0u8; MAGIC.len()];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(PuckError::Checkpoint("not a puck checkpoint (bad magic)".into()));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != VERSION {
        return Err(PuckError::Checkpoint(format!(
            "unsupported checkpoint version {} (expected {})",
            version[0], VERSION
        )));
    }

    let config_len = read_u32(reader)?;
    let config: ModelConfig = serde_json::from_slice(&read_bytes(reader, config_len)?)?;

    let count = read_u32(reader)?;
    let mut tensors = HashMap::with_capacity(count);
    for _ in 0..count {
        let name_len = read_u32(reader)?;
        let name = String::from_utf8(read_bytes(reader, name_len)?)
            .map_err(|e| PuckError::Checkpoint(format!("parameter name is not UTF-8: {}", e)))?;
        let tensor = read_tensor(reader)?;
        if tensors.insert(name.clone(), tensor).is_some() {
            return Err(PuckError::Checkpoint(format!("duplicate tensor '{}'", name)));
        }
    }

    // Initial weights are overwritten below; the seed only fills the shapes.
    let mut model = LanguageModel::new(config, &mut StdRng::seed_from_u64(0))?;
    for (name, param) in model.parameters_mut() {
        let tensor = tensors
            .remove(&name)
            .ok_or_else(|| PuckError::Checkpoint(format!("missing tensor '{}'", name)))?;
        if tensor.shape != param.shape {
            return Err(PuckError::Checkpoint(format!(
                "tensor '{}' has shape {:?}, model expects {:?}",
                name, tensor.shape, param.shape
            )));
        }
        *param = tensor;
    }

    if let Some(extra) = tensors.keys().next() {
        return Err(PuckError::Checkpoint(format!(
            "unexpected tensor '{}' ({} extra in total)",
            extra,
            tensors.len()
        )));
    }

    Ok(model)
}

fn write_u32<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| PuckError::Checkpoint(format!("{} does not fit in u32", value)))?;
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_tensor<W: Write>(writer: &mut W, tensor: &Tensor) -> Result<()> {
    write_u32(writer, tensor.shape.len())?;
    for &dim in &tensor.shape {
        write_u32(writer, dim)?;
    }
    write_u32(writer, tensor.data.len())?;
    for &val in &tensor.data {
        writer.write_all(&val.to_le_bytes())?;
    }
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> Result<usize> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf) as usize)
}

// Grows with the data actually present, so a corrupt length cannot force a
// huge allocation up front.
fn read_bytes<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(PuckError::Checkpoint(format!(
            "unexpected end of file: wanted {} bytes, found {}",
            len,
            buf.len()
        )));
    }
    Ok(buf)
}

fn read_tensor<R: Read>(reader: &mut R) -> Result<Tensor> {
    let ndim = read_u32(reader)?;
    let shape = (0..ndim)
        .map(|_| read_u32(reader))
        .collect::<Result<Vec<_>>>()?;

    let numel = shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| PuckError::Checkpoint(format!("tensor shape {:?} is too large", shape)))?;

    let len = read_u32(reader)?;
    if len != numel {
        return Err(PuckError::Checkpoint(format!(
            "tensor of shape {:?} declares {} values",
            shape, len
        )));
    }
    let byte_len = len
        .checked_mul(4)
        .ok_or_else(|| PuckError::Checkpoint(format!("{} values is too large", len)))?;

    let data = read_bytes(reader, byte_len)?
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(Tensor::new(data, shape))
}
