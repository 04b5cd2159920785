//! Offline builds: dataset file in, model directory (and optionally a
//! catalog) out.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use sonority_core::schema::Catalog;
use sonority_core::Song;
use sonority_search::{BuildError, BuildOptions, IndexBuilder, TrainingRow};

use crate::dataset::{DatasetReader, DatasetRow};
use crate::error::EtlResult;

/// What a build produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub rows: usize,
    pub chunks: usize,
    pub trees: usize,
    pub seed: u64,
    /// Rows written to the catalog, when one was given.
    pub songs_imported: Option<usize>,
    pub model_dir: PathBuf,
}

/// Build a model from a dataset file and save it to `output_dir`.
///
/// The dataset is read in chunks of `options.chunk_size` rows. The output
/// directory is replaced atomically, so a concurrent reader sees either the
/// previous model or the new one.
pub fn build_model(
    dataset: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: BuildOptions,
) -> EtlResult<BuildSummary> {
    run_build(dataset.as_ref(), output_dir.as_ref(), options, None)
}

/// Like [`build_model`], also writing every row's name, artists and
/// popularity into `catalog` under its index id.
///
/// The catalog is replaced only after the model has been saved, so a failed
/// build leaves both the previous model and the previous catalog in place.
pub fn build_model_with_catalog(
    dataset: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: BuildOptions,
    catalog: &mut Catalog,
) -> EtlResult<BuildSummary> {
    run_build(dataset.as_ref(), output_dir.as_ref(), options, Some(catalog))
}

/// Replace the rows of `catalog` with a dataset's songs without building a
/// model.
///
/// Ids follow row order, matching the ids a build over the same file
/// assigns. Nothing is written unless the whole file parses.
pub fn import_catalog(
    dataset: impl AsRef<Path>,
    catalog: &mut Catalog,
    chunk_size: usize,
) -> EtlResult<usize> {
    let reader = DatasetReader::open(dataset, chunk_size)?;
    let mut songs = Vec::new();
    for chunk in reader {
        collect_songs(&mut songs, &chunk?)?;
    }
    let imported = catalog.replace_songs(&songs)?;
    log::info!("Imported {imported} songs into the catalog");
    Ok(imported)
}

fn run_build(
    dataset: &Path,
    output_dir: &Path,
    options: BuildOptions,
    catalog: Option<&mut Catalog>,
) -> EtlResult<BuildSummary> {
    let started = Instant::now();
    log::info!(
        "Building model from {} ({} trees, chunks of {})",
        dataset.display(),
        options.tree_count,
        options.chunk_size
    );

    let reader = DatasetReader::open(dataset, options.chunk_size)?;
    let mut builder = IndexBuilder::new(options);
    let mut chunks = 0;
    let mut songs = Vec::new();

    for chunk in reader {
        let chunk = chunk?;
        let rows: Vec<TrainingRow> = chunk.iter().map(DatasetRow::training_row).collect();
        builder.push_chunk(&rows)?;
        if catalog.is_some() {
            collect_songs(&mut songs, &chunk)?;
        }
        chunks += 1;
    }

    let rows = builder.len();
    let model = builder.finish()?;
    model.save(output_dir)?;

    let songs_imported = match catalog {
        Some(catalog) => Some(catalog.replace_songs(&songs)?),
        None => None,
    };

    let summary = BuildSummary {
        rows,
        chunks,
        trees: model.index().tree_count(),
        seed: model.index().seed(),
        songs_imported,
        model_dir: output_dir.to_path_buf(),
    };
    log::info!(
        "Built model with {} items in {:.1}s",
        summary.rows,
        started.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Append the chunk's catalog rows, numbering them after those already
/// collected.
fn collect_songs(songs: &mut Vec<Song>, chunk: &[DatasetRow]) -> EtlResult<()> {
    songs.reserve(chunk.len());
    for row in chunk {
        let id = u32::try_from(songs.len())
            .map_err(|_| BuildError::TooManyRows { rows: songs.len() + 1 })?;
        songs.push(row.song(id));
    }
    Ok(())
}
