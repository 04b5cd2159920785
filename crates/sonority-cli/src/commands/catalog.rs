use anyhow::{Context, Result};
use sonority_core::schema::Catalog;
use sonority_etl::{import_catalog, Config};
use std::path::Path;

fn open_catalog(config: &Config) -> Result<Catalog> {
    if let Some(parent) = config.catalog_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create catalog directory")?;
    }
    Catalog::open(&config.catalog_path)
        .with_context(|| format!("Failed to open catalog {}", config.catalog_path.display()))
}

/// Load song rows from a dataset without building a model.
pub fn import(config: &Config, dataset: &Path) -> Result<()> {
    let mut catalog = open_catalog(config)?;
    let imported = import_catalog(dataset, &mut catalog, config.chunk_size)?;
    println!("✓ Imported {imported} songs into {}", config.catalog_path.display());
    Ok(())
}

pub fn search(config: &Config, text: &str, limit: usize) -> Result<()> {
    let catalog = open_catalog(config)?;
    let songs = catalog.search(text, limit)?;

    if songs.is_empty() {
        println!("No songs match {text:?}");
        return Ok(());
    }

    for song in songs {
        println!(
            "  {:>7}  {:>5.1}  {} - {} ({})",
            song.id, song.popularity, song.artists, song.name, song.year
        );
    }
    Ok(())
}

pub fn show(config: &Config, id: u32) -> Result<()> {
    let catalog = open_catalog(config)?;
    let Some(song) = catalog.get_song(id)? else {
        anyhow::bail!("No song with id {id}");
    };

    println!("  Id:         {}", song.id);
    println!("  Name:       {}", song.name);
    println!("  Artists:    {}", song.artists);
    println!("  Year:       {}", song.year);
    println!("  Popularity: {:.1}", song.popularity);
    Ok(())
}
