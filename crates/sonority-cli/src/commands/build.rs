use anyhow::{Context, Result};
use sonority_core::schema::Catalog;
use sonority_etl::{build_model, build_model_with_catalog, Config, EtlError, REQUIRED_COLUMNS};
use std::path::Path;

pub fn run_build(config: &Config, dataset: &Path, with_catalog: bool) -> Result<()> {
    println!("Building model from {}", dataset.display());

    let options = config.build_options();
    let result = if with_catalog {
        if let Some(parent) = config.catalog_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create catalog directory")?;
        }
        let mut catalog = Catalog::open(&config.catalog_path)?;
        build_model_with_catalog(dataset, &config.model_dir, options, &mut catalog)
    } else {
        build_model(dataset, &config.model_dir, options)
    };

    let summary = match result {
        Ok(summary) => summary,
        Err(e @ EtlError::MissingColumn { .. }) => {
            anyhow::bail!("{e}\n\nRequired columns: {}", REQUIRED_COLUMNS.join(", "));
        }
        Err(e) => return Err(e.into()),
    };

    println!("\n✓ Build complete");
    println!("  Items:  {}", summary.rows);
    println!("  Chunks: {}", summary.chunks);
    println!("  Trees:  {}", summary.trees);
    println!("  Seed:   {}", summary.seed);
    if let Some(songs) = summary.songs_imported {
        println!("  Catalog: {songs} songs in {}", config.catalog_path.display());
    }
    println!("  Model:  {}", summary.model_dir.display());

    Ok(())
}
