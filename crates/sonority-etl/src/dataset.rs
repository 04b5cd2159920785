//! Chunked reading of the tabular song dataset.
//!
//! The dataset is a CSV file with a header row. Row order defines index ids:
//! the first data row becomes id 0.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use sonority_core::{Feature, FeatureVector, Song, FEATURE_COUNT};
use sonority_search::TrainingRow;

use crate::error::{EtlError, EtlResult};

/// Columns every dataset must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = ["acousticness", "liveness", "valence", "tempo", "year"];

/// One parsed dataset row.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub features: FeatureVector,
    pub year: u16,
    pub name: String,
    pub artists: String,
    pub popularity: f64,
}

impl DatasetRow {
    #[must_use]
    pub const fn training_row(&self) -> TrainingRow {
        TrainingRow::new(self.features, self.year)
    }

    /// The catalog entry for this row, keyed by its index id.
    #[must_use]
    pub fn song(&self, id: u32) -> Song {
        Song::new(id, self.name.clone(), self.artists.clone(), self.year)
            .with_popularity(self.popularity)
    }
}

#[derive(Debug, Clone)]
struct Columns {
    features: [usize; FEATURE_COUNT],
    year: usize,
    name: Option<usize>,
    artists: Option<usize>,
    popularity: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> EtlResult<Self> {
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim(), i))
            .collect();
        let require = |column: &'static str| {
            positions
                .get(column)
                .copied()
                .ok_or(EtlError::MissingColumn { column })
        };

        let mut features = [0; FEATURE_COUNT];
        for feature in Feature::ALL {
            features[feature.index()] = require(feature.name())?;
        }

        Ok(Self {
            features,
            year: require("year")?,
            name: positions.get("name").copied(),
            artists: positions.get("artists").copied(),
            popularity: positions.get("popularity").copied(),
        })
    }
}

/// Reads a dataset in fixed-size chunks so peak memory stays bounded by the
/// chunk size rather than the file size.
#[derive(Debug)]
pub struct DatasetReader<R> {
    reader: csv::Reader<R>,
    columns: Columns,
    chunk_size: usize,
    record: StringRecord,
    rows_read: usize,
    done: bool,
}

impl DatasetReader<File> {
    /// Open a dataset file and validate its header.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> EtlResult<Self> {
        let path = path.as_ref();
        log::debug!("Opening dataset {}", path.display());
        let reader = csv::Reader::from_path(path)?;
        Self::with_reader(reader, chunk_size)
    }
}

impl<R: Read> DatasetReader<R> {
    /// Wrap any byte source holding CSV data.
    pub fn from_reader(source: R, chunk_size: usize) -> EtlResult<Self> {
        Self::with_reader(csv::Reader::from_reader(source), chunk_size)
    }

    fn with_reader(mut reader: csv::Reader<R>, chunk_size: usize) -> EtlResult<Self> {
        let columns = Columns::from_headers(reader.headers()?)?;
        Ok(Self {
            reader,
            columns,
            chunk_size: chunk_size.max(1),
            record: StringRecord::new(),
            rows_read: 0,
            done: false,
        })
    }

    /// Rows returned so far.
    #[must_use]
    pub const fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Read the next chunk, or `None` once the file is exhausted.
    pub fn next_chunk(&mut self) -> EtlResult<Option<Vec<DatasetRow>>> {
        if self.done {
            return Ok(None);
        }

        let mut chunk = Vec::with_capacity(self.chunk_size);
        while chunk.len() < self.chunk_size {
            if !self.reader.read_record(&mut self.record)? {
                self.done = true;
                break;
            }
            chunk.push(self.parse_record()?);
        }

        self.rows_read += chunk.len();
        if chunk.is_empty() {
            Ok(None)
        } else {
            Ok(Some(chunk))
        }
    }

    fn parse_record(&self) -> EtlResult<DatasetRow> {
        let line = self.record.position().map_or(0, csv::Position::line);
        let record = &self.record;
        let cell = |index: usize| record.get(index).unwrap_or("").trim();

        let mut values = [0.0; FEATURE_COUNT];
        for feature in Feature::ALL {
            let raw = cell(self.columns.features[feature.index()]);
            values[feature.index()] = parse_number(raw).ok_or_else(|| EtlError::MalformedRow {
                line,
                column: feature.name(),
                value: raw.to_string(),
            })?;
        }

        let raw_year = cell(self.columns.year);
        let year = parse_year(raw_year).ok_or_else(|| EtlError::MalformedRow {
            line,
            column: "year",
            value: raw_year.to_string(),
        })?;

        let popularity = match self.columns.popularity.map(cell) {
            None | Some("") => 0.0,
            Some(raw) => parse_number(raw).ok_or_else(|| EtlError::MalformedRow {
                line,
                column: "popularity",
                value: raw.to_string(),
            })?,
        };

        Ok(DatasetRow {
            features: FeatureVector::from_array(values),
            year,
            name: self.columns.name.map(cell).unwrap_or_default().to_string(),
            artists: self
                .columns
                .artists
                .map(cell)
                .map(clean_artists)
                .unwrap_or_default(),
            popularity,
        })
    }
}

impl<R: Read> Iterator for DatasetReader<R> {
    type Item = EtlResult<Vec<DatasetRow>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Years are sometimes exported as floats ("1999.0"); accept those when the
/// fraction is zero.
#[allow(clippy::cast_sign_loss)]
fn parse_year(raw: &str) -> Option<u16> {
    if let Ok(year) = raw.parse::<u16>() {
        return Some(year);
    }
    let value = parse_number(raw)?;
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u16::MAX) {
        return None;
    }
    Some(value as u16)
}

/// Artist cells often hold a quoted list literal such as
/// `['Miles Davis', 'John Coltrane']`; flatten those to a comma-separated
/// string. Commas inside a quoted name belong to the name.
fn clean_artists(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) else {
        return raw.to_string();
    };
    let mut names = Vec::new();
    let mut rest = inner.trim();
    while let Some(quote) = rest.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let body = &rest[1..];
        let Some(end) = body.find(quote) else {
            break;
        };
        names.push(body[..end].trim());
        rest = body[end + 1..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }
    // Unquoted leftovers: plain comma-separated names.
    names.extend(rest.split(',').map(str::trim));
    names.retain(|name| !name.is_empty());
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
name,artists,acousticness,liveness,valence,tempo,year,popularity
So What,['Miles Davis'],0.6,0.1,0.4,136.0,1959,70
Naima,\"['John Coltrane', 'Wynton Kelly']\",0.9,0.2,0.3,62.5,1960.0,55
Teen Town,['Weather Report'],0.1,0.3,0.8,125.2,1977,
";

    #[test]
    fn test_reads_in_chunks() {
        let mut reader = DatasetReader::from_reader(SAMPLE.as_bytes(), 2).unwrap();
        let first = reader.next_chunk().unwrap().unwrap();
        let second = reader.next_chunk().unwrap().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(reader.next_chunk().unwrap().is_none());
        assert_eq!(reader.rows_read(), 3);
    }

    #[test]
    fn test_parses_fields() {
        let rows: Vec<DatasetRow> = DatasetReader::from_reader(SAMPLE.as_bytes(), 10)
            .unwrap()
            .collect::<EtlResult<Vec<_>>>()
            .unwrap()
            .concat();

        assert_eq!(rows[0].name, "So What");
        assert_eq!(rows[0].artists, "Miles Davis");
        assert_eq!(rows[0].features, FeatureVector::new(0.6, 0.1, 0.4, 136.0));
        assert!((rows[0].popularity - 70.0).abs() < f64::EPSILON);

        assert_eq!(rows[1].year, 1960);
        assert_eq!(rows[1].artists, "John Coltrane, Wynton Kelly");

        assert!(rows[2].popularity.abs() < f64::EPSILON);
        assert_eq!(rows[2].song(2).id, 2);
    }

    #[test]
    fn test_missing_column() {
        let data = "acousticness,liveness,valence,year\n0.1,0.2,0.3,1999\n";
        let err = DatasetReader::from_reader(data.as_bytes(), 10).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { column: "tempo" }));
        assert!(err.is_dataset_error());
    }

    #[test]
    fn test_only_required_columns() {
        let data = "acousticness,liveness,valence,tempo,year\n0.1,0.2,0.3,100,1999\n";
        let mut reader = DatasetReader::from_reader(data.as_bytes(), 10).unwrap();
        let rows = reader.next_chunk().unwrap().unwrap();
        assert_eq!(rows[0].name, "");
        assert_eq!(rows[0].training_row().year, 1999);
    }

    #[test]
    fn test_malformed_feature() {
        let data = "acousticness,liveness,valence,tempo,year\n0.1,0.2,0.3,100,1999\n0.1,oops,0.3,100,1999\n";
        let mut reader = DatasetReader::from_reader(data.as_bytes(), 10).unwrap();
        let err = reader.next_chunk().unwrap_err();
        match err {
            EtlError::MalformedRow {
                line,
                column,
                value,
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, "liveness");
                assert_eq!(value, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let data = "acousticness,liveness,valence,tempo,year\nNaN,0.2,0.3,100,1999\n";
        let mut reader = DatasetReader::from_reader(data.as_bytes(), 10).unwrap();
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("1999"), Some(1999));
        assert_eq!(parse_year("1999.0"), Some(1999));
        assert_eq!(parse_year("1999.5"), None);
        assert_eq!(parse_year("-4"), None);
        assert_eq!(parse_year("70000"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_clean_artists() {
        assert_eq!(clean_artists("Bill Evans"), "Bill Evans");
        assert_eq!(clean_artists("['A', \"B\"]"), "A, B");
        assert_eq!(clean_artists("[]"), "");
    }

    #[test]
    fn test_clean_artists_keeps_commas_in_names() {
        assert_eq!(
            clean_artists("['Tyler, The Creator', 'Frank Ocean']"),
            "Tyler, The Creator, Frank Ocean"
        );
        assert_eq!(
            clean_artists("[\"Guns N' Roses\", 'Earth, Wind & Fire']"),
            "Guns N' Roses, Earth, Wind & Fire"
        );
        assert_eq!(clean_artists("[Plain, List]"), "Plain, List");
    }
}
