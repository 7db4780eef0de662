//! Keyed archives used by the `save`/`load` hooks of optimizers.
//!
//! Each entry is a serde value encoded with `bincode`. Tensors are stored as
//! shape, dtype, device and `f64` values, which is lossless for both
//! supported dtypes.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use optikit_core::buffer::Buffer;
use optikit_core::{DType, StorageDevice, Tensor};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::OptimError;
use crate::optimizer_trait::OptimizerCore;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
enum DTypeRecord {
    F32,
    F64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
enum DeviceRecord {
    Cpu,
    Gpu(usize),
}

#[derive(Serialize, Deserialize, Debug)]
struct TensorRecord {
    shape: Vec<usize>,
    dtype: DTypeRecord,
    device: DeviceRecord,
    data: Vec<f64>,
}

impl TensorRecord {
    fn from_tensor(tensor: &Tensor) -> Self {
        TensorRecord {
            shape: tensor.shape(),
            dtype: match tensor.dtype() {
                DType::F32 => DTypeRecord::F32,
                DType::F64 => DTypeRecord::F64,
            },
            device: match tensor.device() {
                StorageDevice::CPU => DeviceRecord::Cpu,
                StorageDevice::GPU(ordinal) => DeviceRecord::Gpu(ordinal),
            },
            data: tensor.to_f64_vec(),
        }
    }

    fn into_tensor(self) -> Result<Tensor, OptimError> {
        let dtype = match self.dtype {
            DTypeRecord::F32 => DType::F32,
            DTypeRecord::F64 => DType::F64,
        };
        let device = match self.device {
            DeviceRecord::Cpu => StorageDevice::CPU,
            DeviceRecord::Gpu(ordinal) => StorageDevice::GPU(ordinal),
        };
        Ok(Tensor::from_buffer(
            Buffer::from_f64(dtype, &self.data),
            self.shape,
            device,
        )?)
    }
}

/// Archive written by `save` hooks.
#[derive(Debug, Default, Clone)]
pub struct OutputArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl OutputArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes (or overwrites) `key`.
    pub fn write<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), OptimError> {
        let bytes = bincode::serialize(value)?;
        self.entries.insert(key.to_string(), bytes);
        Ok(())
    }

    pub fn write_tensor(&mut self, key: &str, tensor: &Tensor) -> Result<(), OptimError> {
        self.write(key, &TensorRecord::from_tensor(tensor))
    }

    pub fn write_tensors(&mut self, key: &str, tensors: &[Tensor]) -> Result<(), OptimError> {
        let records: Vec<TensorRecord> = tensors.iter().map(TensorRecord::from_tensor).collect();
        self.write(key, &records)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, OptimError> {
        Ok(bincode::serialize(&self.entries)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), OptimError> {
        let file = File::create(path.as_ref())?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, &self.entries)?;
        log::debug!("Saved archive with {} entries to {:?}", self.entries.len(), path.as_ref());
        Ok(())
    }

    /// Reopens the written entries for reading.
    pub fn into_input(self) -> InputArchive {
        InputArchive {
            entries: self.entries,
        }
    }
}

/// Archive read by `load` hooks.
#[derive(Debug, Default, Clone)]
pub struct InputArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl InputArchive {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OptimError> {
        Ok(InputArchive {
            entries: bincode::deserialize(bytes)?,
        })
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, OptimError> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        let entries: BTreeMap<String, Vec<u8>> = bincode::deserialize_from(reader)?;
        log::debug!("Loaded archive with {} entries from {:?}", entries.len(), path.as_ref());
        Ok(InputArchive { entries })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<T, OptimError> {
        self.try_read(key)?
            .ok_or_else(|| OptimError::MissingKey(key.to_string()))
    }

    /// Like [`read`](Self::read), but a missing key yields `Ok(None)`.
    pub fn try_read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, OptimError> {
        match self.entries.get(key) {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn read_tensor(&self, key: &str) -> Result<Tensor, OptimError> {
        self.read::<TensorRecord>(key)?.into_tensor()
    }

    pub fn read_tensors(&self, key: &str) -> Result<Vec<Tensor>, OptimError> {
        self.read::<Vec<TensorRecord>>(key)?
            .into_iter()
            .map(TensorRecord::into_tensor)
            .collect()
    }
}

/// Writes `optimizer` into `archive` through its `save` hook.
pub fn save_optimizer<Op: OptimizerCore + ?Sized>(
    archive: &mut OutputArchive,
    optimizer: &Op,
) -> Result<(), OptimError> {
    optimizer.save(archive)
}

/// Restores `optimizer` from `archive` through its `load` hook.
pub fn load_optimizer<Op: OptimizerCore + ?Sized>(
    archive: &InputArchive,
    optimizer: &mut Op,
) -> Result<(), OptimError> {
    optimizer.load(archive)
}
