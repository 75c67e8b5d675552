//! File I/O for OpenWeatherMap city lists.
//!
//! Two layouts are understood:
//! - line-delimited JSON, one city object per line (the classic `city.list.json`);
//! - a single JSON array of city objects (the newer download).
//!
//! Either may be zstd-compressed (`.zst`). Cities carry their id under `_id`
//! or `id`; output always uses `_id`.

use geodedup_core::compression::compressor_for_path;
use geodedup_core::{CityRecord, GeoError};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufWriter, Cursor, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during I/O operations.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid coordinate for city {id} at line {line}: lat={lat}, lon={lon}")]
    InvalidCoordinate {
        line: usize,
        id: u64,
        lat: f64,
        lon: f64,
    },

    #[error("Invalid coordinate for city {id} at array position {position}: lat={lat}, lon={lon}")]
    InvalidArrayCoordinate {
        position: usize,
        id: u64,
        lat: f64,
        lon: f64,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Compression error: {0}")]
    Compression(#[from] GeoError),
}

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, IoError>;

/// Layout of a city list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// One JSON object per line.
    Jsonl,
    /// A single JSON array.
    Json,
}

impl InputFormat {
    /// Detect format from the file extension, looking through a `.zst` suffix.
    ///
    /// `.json` maps to [`InputFormat::Jsonl`] because the classic city list is
    /// line-delimited despite its name; [`read_cities`] sniffs the content anyway.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let path = if compressor_for_path(path).is_some() {
            Path::new(path.file_stem()?)
        } else {
            path
        };
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "jsonl" | "ndjson" | "json" => Some(InputFormat::Jsonl),
            _ => None,
        }
    }
}

/// Read a city list, decompressing `.zst` files and sniffing the layout.
///
/// Coordinates are validated; a city with NaN or out-of-range lat/lon fails
/// the whole read.
pub fn read_cities<P: AsRef<Path>>(path: P) -> Result<Vec<CityRecord>> {
    let path = path.as_ref();
    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;

    if let Some(compressor) = compressor_for_path(path) {
        raw = compressor.decompress(&raw)?;
    }

    let cities = read_cities_from(Cursor::new(raw))?;
    debug!(path = %path.display(), cities = cities.len(), "Loaded city list");
    Ok(cities)
}

/// Read cities from an uncompressed reader in either layout.
pub fn read_cities_from<R: BufRead>(mut reader: R) -> Result<Vec<CityRecord>> {
    let is_array = loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(Vec::new());
        }
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(pos) => {
                let first = buf[pos];
                break first == b'[';
            }
            None => {
                let len = buf.len();
                reader.consume(len);
            }
        }
    };

    if is_array {
        let cities: Vec<CityRecord> = serde_json::from_reader(reader).map_err(|e| IoError::Parse {
            line: e.line(),
            message: e.to_string(),
        })?;
        if let Some((position, city)) = cities.iter().enumerate().find(|(_, c)| !c.coord.is_valid()) {
            return Err(IoError::InvalidArrayCoordinate {
                position,
                id: city.id,
                lat: city.lat(),
                lon: city.lon(),
            });
        }
        return Ok(cities);
    }

    let mut cities = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let city: CityRecord = serde_json::from_str(&line).map_err(|e| IoError::Parse {
            line: line_num + 1,
            message: e.to_string(),
        })?;
        check_coordinate(&city, line_num + 1)?;
        cities.push(city);
    }
    Ok(cities)
}

fn check_coordinate(city: &CityRecord, line: usize) -> Result<()> {
    if city.coord.is_valid() {
        Ok(())
    } else {
        Err(IoError::InvalidCoordinate {
            line,
            id: city.id,
            lat: city.lat(),
            lon: city.lon(),
        })
    }
}

/// Write cities in the given layout, zstd-compressed if the path ends in `.zst`.
pub fn write_cities<P: AsRef<Path>>(path: P, cities: &[CityRecord], format: InputFormat) -> Result<()> {
    let path = path.as_ref();
    match compressor_for_path(path) {
        Some(compressor) => {
            let mut buf = Vec::new();
            write_cities_to(&mut buf, cities, format)?;
            let compressed = compressor.compress(&buf)?;
            std::fs::write(path, compressed)?;
        }
        None => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_cities_to(&mut writer, cities, format)?;
            writer.flush()?;
        }
    }
    debug!(path = %path.display(), cities = cities.len(), "Wrote city list");
    Ok(())
}

/// Write cities to any writer.
pub fn write_cities_to<W: Write>(mut writer: W, cities: &[CityRecord], format: InputFormat) -> Result<()> {
    match format {
        InputFormat::Jsonl => {
            for city in cities {
                serde_json::to_writer(&mut writer, city)?;
                writer.write_all(b"\n")?;
            }
        }
        InputFormat::Json => {
            serde_json::to_writer(&mut writer, cities)?;
            writer.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// An in-memory city list with lookup helpers.
#[derive(Debug, Clone, Default)]
pub struct CityList {
    cities: Vec<CityRecord>,
}

impl CityList {
    /// Wrap an already loaded list.
    #[must_use]
    pub fn new(cities: Vec<CityRecord>) -> Self {
        Self { cities }
    }

    /// Load a list from disk, see [`read_cities`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(read_cities(path)?))
    }

    /// All cities in file order.
    #[must_use]
    pub fn cities(&self) -> &[CityRecord] {
        &self.cities
    }

    /// Take the cities out.
    #[must_use]
    pub fn into_inner(self) -> Vec<CityRecord> {
        self.cities
    }

    /// Sorted, unique country codes.
    #[must_use]
    pub fn countries(&self) -> Vec<&str> {
        self.cities
            .iter()
            .map(|c| c.country.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Cities grouped by country code.
    #[must_use]
    pub fn by_country(&self) -> BTreeMap<&str, Vec<&CityRecord>> {
        let mut groups: BTreeMap<&str, Vec<&CityRecord>> = BTreeMap::new();
        for city in &self.cities {
            groups.entry(city.country.as_str()).or_default().push(city);
        }
        groups
    }

    /// Cities whose name contains `name` (case-insensitive), optionally
    /// restricted to one country.
    pub fn find<'s>(
        &'s self,
        name: &str,
        country: Option<&'s str>,
    ) -> impl Iterator<Item = &'s CityRecord> + 's {
        let needle = name.to_lowercase();
        self.cities.iter().filter(move |city| {
            country.map_or(true, |c| city.country == c) && city.name.to_lowercase().contains(&needle)
        })
    }

    /// Number of cities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cities.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}
