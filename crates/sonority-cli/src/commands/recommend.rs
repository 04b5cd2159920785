use anyhow::{Context, Result};
use sonority_core::schema::Catalog;
use sonority_core::{Feature, FeatureVector, RecommendResponse, Recommendation, Song};
use sonority_etl::{Config, FeatureSource, StaticFeatureSource, WithFallback};
use sonority_search::{Engine, ModelHandle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where the query's features come from.
#[derive(Debug)]
pub enum Query {
    /// `key=value` pairs from the command line.
    Features(Vec<String>),
    /// A track id resolved through a JSON feature table.
    Track { track: String, tracks: PathBuf },
}

pub fn run_recommend(
    config: &Config,
    query: &Query,
    year: Option<u16>,
    count: usize,
    json: bool,
) -> Result<()> {
    let features = match query {
        Query::Features(pairs) => FeatureVector::from_map(&parse_pairs(pairs)?)?,
        Query::Track { track, tracks } => {
            let source = WithFallback::new(StaticFeatureSource::from_json_file(tracks)?);
            source.features_for(track)?
        }
    };

    let handle = load_handle(config)?;
    let results = handle.recommend(&features, year, count)?;
    print_results(config, &results, json)
}

pub fn run_profile(config: &Config, tracks: &Path, count: usize, json: bool) -> Result<()> {
    let contents = std::fs::read_to_string(tracks)
        .with_context(|| format!("Failed to read {}", tracks.display()))?;
    let maps: Vec<HashMap<String, f64>> =
        serde_json::from_str(&contents).context("Expected a JSON array of feature objects")?;
    let vectors = maps
        .iter()
        .map(FeatureVector::from_map)
        .collect::<sonority_core::Result<Vec<_>>>()?;

    let handle = load_handle(config)?;
    let results = handle.current()?.recommend_profile(&vectors, count)?;
    print_results(config, &results, json)
}

fn load_handle(config: &Config) -> Result<ModelHandle> {
    let engine = Engine::load(&config.model_dir).with_context(|| {
        format!(
            "Failed to load model from {}\n\nRun `sonority build <dataset>` first.",
            config.model_dir.display()
        )
    })?;
    Ok(ModelHandle::with_engine(engine))
}

fn parse_pairs(pairs: &[String]) -> Result<HashMap<String, f64>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected KEY=VALUE, got {pair:?}"))?;
            let value: f64 = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid number for {key}: {value:?}"))?;
            Ok((key.trim().to_ascii_lowercase(), value))
        })
        .collect()
}

fn print_results(config: &Config, results: &[Recommendation], json: bool) -> Result<()> {
    if json {
        let response = RecommendResponse::from(results);
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No recommendations.");
        return Ok(());
    }

    let songs = lookup_songs(config, results);

    println!(
        "\n  {:>3}  {:>7}  {:>6}  {:<40}  {}",
        "#", "id", "score", "song", "per-feature"
    );
    for (rank, rec) in results.iter().enumerate() {
        let title = songs
            .get(&rec.id)
            .map_or_else(|| "-".to_string(), |s| format!("{} - {} ({})", s.artists, s.name, s.year));
        let breakdown: Vec<String> = Feature::ALL
            .iter()
            .map(|f| format!("{}={:.2}", &f.name()[..3], rec.breakdown.get(*f)))
            .collect();
        println!(
            "  {:>3}  {:>7}  {:>6.3}  {:<40}  {}",
            rank + 1,
            rec.id,
            rec.score,
            truncate(&title, 40),
            breakdown.join(" ")
        );
    }

    Ok(())
}

/// Song rows for the results, or nothing when no catalog has been built.
fn lookup_songs(config: &Config, results: &[Recommendation]) -> HashMap<u32, Song> {
    if !config.catalog_path.exists() {
        return HashMap::new();
    }
    let ids: Vec<u32> = results.iter().map(|r| r.id).collect();
    match Catalog::open(&config.catalog_path).and_then(|c| c.get_songs(&ids)) {
        Ok(songs) => songs.into_iter().map(|s| (s.id, s)).collect(),
        Err(e) => {
            log::warn!("Catalog lookup failed: {e}");
            HashMap::new()
        }
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = vec!["Tempo=120".to_string(), "valence = 0.5".to_string()];
        let map = parse_pairs(&pairs).unwrap();
        assert!((map["tempo"] - 120.0).abs() < f64::EPSILON);
        assert!((map["valence"] - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_pairs_rejects_garbage() {
        assert!(parse_pairs(&["tempo".to_string()]).is_err());
        assert!(parse_pairs(&["tempo=fast".to_string()]).is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
    }
}
