use anyhow::{Context, Result};
use sonority_etl::{config, Config};

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    let config_path = config::config_file_path();
    println!("Config file: {}", config_path.display());
    let exists = config_path.exists();
    println!(
        "File exists: {}\n",
        if exists { "yes" } else { "no (using defaults)" }
    );

    println!("Settings:");
    println!("  model_dir: {}", config.model_dir.display());
    println!("  catalog_path: {}", config.catalog_path.display());
    println!("  tree_count: {}", config.tree_count);
    println!("  chunk_size: {}", config.chunk_size);
    println!(
        "  seed: {}",
        config
            .seed
            .map_or_else(|| String::from("<random>"), |s| s.to_string())
    );
    println!("  default_count: {}", config.default_count);
    println!("  logging.level: {}", config.logging.level);
    println!("  logging.coloured: {}", config.logging.coloured);
    println!("  logging.report_caller: {}", config.logging.report_caller);

    println!("\nPriority: CLI args > ENV vars (SONORITY_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value.
pub fn get_config(config: &Config, key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        match key.as_str() {
            "model_dir" => println!("{}", config.model_dir.display()),
            "catalog_path" => println!("{}", config.catalog_path.display()),
            "tree_count" => println!("{}", config.tree_count),
            "chunk_size" => println!("{}", config.chunk_size),
            "seed" => println!(
                "{}",
                config
                    .seed
                    .map_or_else(|| String::from("<not set>"), |s| s.to_string())
            ),
            "default_count" => println!("{}", config.default_count),
            _ => {
                anyhow::bail!(
                    "Unknown config key: {key}\n\nValid keys: {}",
                    config::SETTABLE_KEYS.join(", ")
                );
            }
        }
    } else {
        // No key provided, show entire config file contents
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{contents}");
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'sonority config init' to create it.");
        }
    }

    Ok(())
}

/// Set a config value.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let config_path = config::config_file_path();

    config::ensure_config_file()?;
    config::set_value(&config_path, key, value)?;

    println!("✓ Updated {key} = {value}");
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() {
    println!("{}", config::config_file_path().display());
}

/// Show example configuration.
pub fn show_example() {
    print!("{}", config::example_config());
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure sonority.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
