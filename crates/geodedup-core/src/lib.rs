//! # geodedup-core
//!
//! Core types for geodedup.
//!
//! Provides shared abstractions for:
//! - Coordinates and city records (OpenWeatherMap city-list shape)
//! - Geodesic distance (haversine, ellipsoidal)
//! - Compression (zstd) for city list files

pub mod compression;
pub mod error;
pub mod geodesy;
pub mod types;

pub use compression::{Compressor, ZstdCompressor};
pub use error::{GeoError, Result};
pub use geodesy::{ellipsoidal_distance, haversine_distance, DistanceMetric};
pub use types::{CityRecord, Coordinate};
