//! On-disk model layout.
//!
//! A model directory holds four files written by the same build:
//!
//! - `content.ann`: header plus the tree forest (bincode)
//! - `metadata.bin`: header plus `{ id, features, year }` records (bincode)
//! - `scaler.json`: per-feature mean and standard deviation
//! - `manifest.json`: written last; marks the directory as complete
//!
//! A save goes to a hidden sibling directory first and is renamed into
//! place, so readers never see a half-written model.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use sonority_core::{CatalogRecord, FEATURE_COUNT};

use crate::ann::AnnIndex;
use crate::error::{BuildError, LoadError};
use crate::metadata::Metadata;
use crate::model::Model;
use crate::scaler::ScalerState;

pub const INDEX_FILE: &str = "content.ann";
pub const METADATA_FILE: &str = "metadata.bin";
pub const SCALER_FILE: &str = "scaler.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Version shared by all four artifacts.
pub const FORMAT_VERSION: u32 = 1;

const INDEX_MAGIC: [u8; 4] = *b"SNRX";
const METADATA_MAGIC: [u8; 4] = *b"SNRM";

#[derive(Debug, Serialize, Deserialize)]
struct BinaryHeader {
    magic: [u8; 4],
    version: u32,
    dimension: u32,
}

impl BinaryHeader {
    const fn new(magic: [u8; 4]) -> Self {
        Self {
            magic,
            version: FORMAT_VERSION,
            dimension: FEATURE_COUNT as u32,
        }
    }

    fn check(&self, artifact: &'static str, magic: [u8; 4]) -> Result<(), LoadError> {
        if self.magic != magic {
            return Err(LoadError::corrupt(artifact, "bad magic bytes"));
        }
        if self.version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion {
                artifact,
                version: self.version,
            });
        }
        check_dimension(artifact, self.dimension as usize)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ScalerFile {
    version: u32,
    mean: Vec<f64>,
    std: Vec<f64>,
}

/// Summary of a saved build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub dimension: usize,
    pub items: usize,
    pub trees: usize,
    pub seed: u64,
    pub built_at: DateTime<Utc>,
}

impl Manifest {
    fn for_model(model: &Model) -> Self {
        Self {
            version: FORMAT_VERSION,
            dimension: FEATURE_COUNT,
            items: model.index().len(),
            trees: model.index().tree_count(),
            seed: model.index().seed(),
            built_at: model.built_at(),
        }
    }
}

/// Write `model` to `dir`.
pub fn save(model: &Model, dir: &Path) -> Result<(), BuildError> {
    let staging = sibling(dir, "partial");
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    write_binary(
        &staging.join(INDEX_FILE),
        &BinaryHeader::new(INDEX_MAGIC),
        model.index(),
    )?;
    write_binary(
        &staging.join(METADATA_FILE),
        &BinaryHeader::new(METADATA_MAGIC),
        &model.metadata().to_sorted_records(),
    )?;
    let scaler = ScalerFile {
        version: FORMAT_VERSION,
        mean: model.scaler().mean.to_vec(),
        std: model.scaler().std.to_vec(),
    };
    write_json(&staging.join(SCALER_FILE), &scaler)?;
    write_json(&staging.join(MANIFEST_FILE), &Manifest::for_model(model))?;

    replace_dir(&staging, dir)?;
    log::info!(
        "Saved model with {} items to {}",
        model.index().len(),
        dir.display()
    );
    Ok(())
}

/// Read the model in `dir`, validating every artifact and their agreement.
pub fn load(dir: &Path) -> Result<Model, LoadError> {
    let manifest = read_manifest(dir)?;

    let scaler_file: ScalerFile = read_json(&dir.join(SCALER_FILE), "scaler")?;
    let scaler = scaler_from_file(scaler_file)?;

    let mut reader = open_artifact(&dir.join(METADATA_FILE))?;
    let header: BinaryHeader = decode(&mut reader, "metadata")?;
    header.check("metadata", METADATA_MAGIC)?;
    let records: Vec<CatalogRecord> = decode(&mut reader, "metadata")?;

    let mut reader = open_artifact(&dir.join(INDEX_FILE))?;
    let header: BinaryHeader = decode(&mut reader, "index")?;
    header.check("index", INDEX_MAGIC)?;
    let index: AnnIndex = decode(&mut reader, "index")?;
    index
        .validate()
        .map_err(|message| LoadError::corrupt("index", message))?;

    let record_count = records.len();
    let metadata: Metadata = records.into_iter().collect();
    if metadata.len() != record_count {
        return Err(LoadError::corrupt("metadata", "duplicate record ids"));
    }
    if index.len() != metadata.len() || index.len() != manifest.items {
        return Err(LoadError::Inconsistent(format!(
            "index has {} items, metadata {}, manifest {}",
            index.len(),
            metadata.len(),
            manifest.items
        )));
    }
    if index.tree_count() != manifest.trees || index.seed() != manifest.seed {
        return Err(LoadError::Inconsistent(
            "index does not match the manifest it was saved with".to_string(),
        ));
    }
    if let Some(record) = metadata
        .to_sorted_records()
        .iter()
        .find(|record| index.vector(record.id) != Some(&record.features))
    {
        return Err(LoadError::Inconsistent(format!(
            "metadata record {} does not match its indexed vector",
            record.id
        )));
    }

    log::info!(
        "Loaded model with {} items and {} trees from {}",
        index.len(),
        index.tree_count(),
        dir.display()
    );
    Ok(Model::new(index, scaler, metadata, manifest.built_at))
}

/// Read only the manifest of the model in `dir`.
pub fn read_manifest(dir: &Path) -> Result<Manifest, LoadError> {
    let manifest: Manifest = read_json(&dir.join(MANIFEST_FILE), "manifest")?;
    if manifest.version != FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion {
            artifact: "manifest",
            version: manifest.version,
        });
    }
    check_dimension("manifest", manifest.dimension)?;
    Ok(manifest)
}

fn scaler_from_file(file: ScalerFile) -> Result<ScalerState, LoadError> {
    if file.version != FORMAT_VERSION {
        return Err(LoadError::UnsupportedVersion {
            artifact: "scaler",
            version: file.version,
        });
    }
    check_dimension("scaler", file.mean.len())?;
    check_dimension("scaler", file.std.len())?;
    if file.mean.iter().any(|m| !m.is_finite())
        || file.std.iter().any(|s| !s.is_finite() || *s <= 0.0)
    {
        return Err(LoadError::corrupt(
            "scaler",
            "mean must be finite and std positive",
        ));
    }
    let mut state = ScalerState {
        mean: [0.0; FEATURE_COUNT],
        std: [1.0; FEATURE_COUNT],
    };
    state.mean.copy_from_slice(&file.mean);
    state.std.copy_from_slice(&file.std);
    Ok(state)
}

fn check_dimension(artifact: &'static str, found: usize) -> Result<(), LoadError> {
    if found == FEATURE_COUNT {
        Ok(())
    } else {
        Err(LoadError::DimensionMismatch {
            artifact,
            expected: FEATURE_COUNT,
            found,
        })
    }
}

/// `<parent>/.<name>.<suffix>`, next to `dir`.
fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    let hidden = format!(".{name}.{suffix}");
    match dir.parent() {
        Some(parent) => parent.join(hidden),
        None => PathBuf::from(hidden),
    }
}

/// Move `staging` to `dir`, retiring whatever was at `dir`.
fn replace_dir(staging: &Path, dir: &Path) -> std::io::Result<()> {
    if let Some(parent) = dir.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if dir.exists() {
        let retired = sibling(dir, "old");
        if retired.exists() {
            fs::remove_dir_all(&retired)?;
        }
        fs::rename(dir, &retired)?;
        if let Err(e) = fs::rename(staging, dir) {
            fs::rename(&retired, dir)?;
            return Err(e);
        }
        if let Err(e) = fs::remove_dir_all(&retired) {
            log::warn!("Could not remove retired model {}: {}", retired.display(), e);
        }
    } else {
        fs::rename(staging, dir)?;
    }
    Ok(())
}

fn write_binary<T: Serialize>(path: &Path, header: &BinaryHeader, body: &T) -> Result<(), BuildError> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, header)?;
    bincode::serialize_into(&mut writer, body)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), BuildError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn open_artifact(path: &Path) -> Result<BufReader<File>, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn decode<T: DeserializeOwned>(
    reader: &mut BufReader<File>,
    artifact: &'static str,
) -> Result<T, LoadError> {
    bincode::deserialize_from(reader).map_err(|e| LoadError::corrupt(artifact, e.to_string()))
}

fn read_json<T: DeserializeOwned>(path: &Path, artifact: &'static str) -> Result<T, LoadError> {
    let reader = open_artifact(path)?;
    serde_json::from_reader(reader).map_err(|e| LoadError::corrupt(artifact, e.to_string()))
}
