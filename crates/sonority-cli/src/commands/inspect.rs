use anyhow::{Context, Result};
use sonority_core::Feature;
use sonority_etl::Config;
use sonority_search::Engine;

pub fn show_inspect(config: &Config, json: bool) -> Result<()> {
    let engine = Engine::load(&config.model_dir)
        .with_context(|| format!("Failed to load model from {}", config.model_dir.display()))?;
    let stats = engine.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\nSonority Model\n");
    println!("  Directory: {}", config.model_dir.display());
    println!("  Built:     {}", stats.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Items:     {}", stats.items);
    println!("  Trees:     {} ({} nodes, leaf size {})", stats.trees, stats.nodes, stats.leaf_size);
    println!("  Seed:      {}", stats.seed);
    if let Some((first, last)) = stats.year_range {
        println!("  Years:     {first}-{last}");
    }

    println!("\n  Scaler (weighted feature space):");
    for feature in Feature::ALL {
        let i = feature.index();
        println!(
            "    {:<13} mean {:>9.4}  std {:>9.4}",
            feature.name(),
            stats.mean[i],
            stats.std[i]
        );
    }

    Ok(())
}
