//! # geodedup
//!
//! Removes near-duplicate entries from city catalogs: any city that lies
//! within a minimum real-world distance of another one is dropped, leaving a
//! catalog whose entries are all farther apart than the threshold.
//!
//! A pair of [`SortedIndex`]es (by latitude and by longitude) restricts each
//! comparison to a rectangular neighborhood; the accept/reject decision itself
//! uses the ellipsoidal distance from [`geodedup_core::geodesy`].
//!
//! ```
//! use geodedup::{CityRecord, Coordinate, DedupConfig, Deduplicator};
//!
//! let cities = vec![
//!     CityRecord::new(1, "A", "DE", Coordinate::new(52.0, 9.0).unwrap()),
//!     CityRecord::new(2, "B", "DE", Coordinate::new(52.0009, 9.0).unwrap()),
//!     CityRecord::new(3, "C", "DE", Coordinate::new(50.0, 9.0).unwrap()),
//! ];
//!
//! let dedup = Deduplicator::new(DedupConfig::with_min_distance(1000.0));
//! let result = dedup.deduplicate(&cities).unwrap();
//!
//! assert_eq!(result.keep_indices, vec![1, 2]);
//! ```
//!
//! ## Order dependence
//!
//! The algorithm is a single greedy pass in input order. Each record is
//! compared only against records that come *after* it; it is dropped if any of
//! them is within the minimum distance. Consequently, within a cluster of near
//! duplicates the last one in input order survives, and the result is not the
//! largest possible well-spaced subset. Reordering the input changes which
//! records survive.

pub mod index;
pub mod io;
pub mod window;

pub use geodedup_core::{
    ellipsoidal_distance, haversine_distance, CityRecord, Coordinate, DistanceMetric,
};
pub use index::{IndexError, RecordId, SortedIndex};
pub use io::{read_cities, write_cities, CityList, InputFormat, IoError};
pub use window::{Window, WindowStrategy};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Default minimum distance between retained cities, in meters.
pub const DEFAULT_MIN_DISTANCE_M: f64 = 2200.0;

/// Neighborhoods at least this large are checked in parallel.
pub const PARALLEL_THRESHOLD: usize = 64;

/// Relative head-room for the haversine pre-check. Larger than the worst-case
/// disagreement between the spherical and ellipsoidal models.
pub const HAVERSINE_PRECHECK_MARGIN: f64 = 0.01;

/// Errors that can occur during deduplication.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid coordinate for id {id}: lat={lat}, lon={lon}")]
    InvalidCoordinate { id: RecordId, lat: f64, lon: f64 },

    #[error("Duplicate record id {0}")]
    DuplicateId(RecordId),

    #[error("Index build failed: {0}")]
    Index(#[from] IndexError),

    /// A reference record was missing from a spatial index. The working set
    /// and the indices no longer agree; the run cannot continue.
    #[error("Spatial index out of sync at id {id}: {source}")]
    IndexDesync {
        id: RecordId,
        #[source]
        source: IndexError,
    },

    #[error("Cancelled after {processed} records")]
    Cancelled { processed: usize },
}

pub type Result<T> = std::result::Result<T, DedupError>;

/// Configuration for deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Records closer than or equal to this distance (meters) are duplicates.
    pub min_distance_m: f64,
    /// Pre-filter window derivation.
    pub window: WindowStrategy,
    /// Distance used for the final decision.
    pub metric: DistanceMetric,
    /// Skip the final metric for pairs the haversine distance already puts far apart.
    pub haversine_precheck: bool,
    /// Check large neighborhoods in parallel.
    pub parallel: bool,
    /// Progress callback interval, in reference records.
    pub report_interval: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_distance_m: DEFAULT_MIN_DISTANCE_M,
            window: WindowStrategy::Derived,
            metric: DistanceMetric::Ellipsoidal,
            haversine_precheck: false,
            parallel: true,
            report_interval: 10_000,
        }
    }
}

impl DedupConfig {
    /// Create config with a specific minimum distance in meters.
    #[must_use]
    pub fn with_min_distance(min_distance_m: f64) -> Self {
        Self {
            min_distance_m,
            ..Default::default()
        }
    }

    /// Set the window strategy.
    #[must_use]
    pub fn window(mut self, window: WindowStrategy) -> Self {
        self.window = window;
        self
    }

    /// Set the decision metric.
    #[must_use]
    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Enable or disable the haversine pre-check.
    #[must_use]
    pub fn haversine_precheck(mut self, enabled: bool) -> Self {
        self.haversine_precheck = enabled;
        self
    }

    /// Enable or disable parallel neighborhood checks.
    #[must_use]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Set the progress callback interval.
    #[must_use]
    pub fn report_interval(mut self, interval: usize) -> Self {
        self.report_interval = interval;
        self
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    /// [`DedupError::InvalidConfig`] describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_distance_m.is_finite() && self.min_distance_m > 0.0) {
            return Err(DedupError::InvalidConfig(format!(
                "min distance must be a positive number of meters, got {}",
                self.min_distance_m
            )));
        }
        if let WindowStrategy::Fixed { dlat, dlon } = self.window {
            if !(dlat.is_finite() && dlat > 0.0 && dlon.is_finite() && dlon > 0.0) {
                return Err(DedupError::InvalidConfig(format!(
                    "fixed window half-widths must be positive, got dlat={dlat}, dlon={dlon}"
                )));
            }
        }
        if self.report_interval == 0 {
            return Err(DedupError::InvalidConfig(
                "report interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Statistics from a deduplication run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupStats {
    /// Records processed.
    pub total_records: usize,
    /// Records retained.
    pub unique_records: usize,
    /// Records dropped.
    pub duplicate_count: usize,
    /// Fraction of records dropped.
    pub duplicate_ratio: f64,
    /// Sum of pre-filter neighborhood sizes over all references.
    pub candidate_count: usize,
    /// Pairs settled by the haversine pre-check alone.
    pub precheck_skips: usize,
    /// Pairs whose ellipsoidal distance was undefined (treated as zero).
    pub degenerate_distances: usize,
    /// Wall-clock time of the run.
    pub elapsed_secs: f64,
}

impl DedupStats {
    /// Throughput in records per second.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.total_records as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Why a record was dropped.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    /// Position of the dropped record in the input.
    pub index: usize,
    /// Id of the dropped record.
    pub id: RecordId,
    /// The first record in neighborhood order within the minimum distance.
    /// Parallel and sequential runs report the same neighbor.
    pub neighbor_id: RecordId,
    /// Gate distance to that neighbor in meters (0.0 when undefined).
    pub distance_m: f64,
}

/// Result of deduplication.
#[derive(Debug, Clone, Default)]
pub struct DedupResult {
    /// Input positions of retained records, in extraction (input) order.
    pub keep_indices: Vec<usize>,
    /// Input positions of dropped records, in input order.
    pub remove_indices: Vec<usize>,
    /// One entry per dropped record.
    pub rejections: Vec<Rejection>,
    /// Run statistics.
    pub stats: DedupStats,
}

impl DedupResult {
    /// Clone the retained records out of `records` (the slice that was deduplicated).
    #[must_use]
    pub fn survivors(&self, records: &[CityRecord]) -> Vec<CityRecord> {
        self.keep_indices.iter().map(|&i| records[i].clone()).collect()
    }
}

/// State of a [`DedupRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Records remain in the working set.
    Running,
    /// The working set is empty; the result is final.
    Done,
}

/// Outcome for one reference record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Kept { index: usize },
    Removed { index: usize, neighbor_id: RecordId, distance_m: f64 },
}

#[derive(Default)]
struct Counters {
    precheck_skips: AtomicUsize,
    degenerate: AtomicUsize,
}

/// An in-progress deduplication over a borrowed record slice.
///
/// Each [`step`](DedupRun::step) extracts the next record from the front of
/// the working set, removes it from both indices and decides on it.
pub struct DedupRun<'a> {
    config: &'a DedupConfig,
    records: &'a [CityRecord],
    by_lat: SortedIndex<'a, CityRecord>,
    by_lon: SortedIndex<'a, CityRecord>,
    next: usize,
    keep_indices: Vec<usize>,
    remove_indices: Vec<usize>,
    rejections: Vec<Rejection>,
    candidate_count: usize,
    counters: Counters,
    started: Instant,
}

impl<'a> DedupRun<'a> {
    fn new(config: &'a DedupConfig, records: &'a [CityRecord]) -> Result<Self> {
        config.validate()?;
        validate_records(records)?;

        let by_lat = SortedIndex::build(records, CityRecord::lat, |c| c.id)?;
        let by_lon = SortedIndex::build(records, CityRecord::lon, |c| c.id)?;

        Ok(Self {
            config,
            records,
            by_lat,
            by_lon,
            next: 0,
            keep_indices: Vec::new(),
            remove_indices: Vec::new(),
            rejections: Vec::new(),
            candidate_count: 0,
            counters: Counters::default(),
            started: Instant::now(),
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RunState {
        if self.next < self.records.len() {
            RunState::Running
        } else {
            RunState::Done
        }
    }

    /// Reference records processed so far.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.next
    }

    /// Records still in the working set.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.by_lat.len()
    }

    /// Process one reference record. Returns `None` once the run is done.
    ///
    /// # Errors
    /// [`DedupError::IndexDesync`] if the reference is missing from an index.
    pub fn step(&mut self) -> Result<Option<Decision>> {
        let records = self.records;
        let Some(reference) = records.get(self.next) else {
            return Ok(None);
        };
        let index = self.next;
        self.next += 1;

        for spatial in [&mut self.by_lat, &mut self.by_lon] {
            spatial.remove_by_id(reference.id).map_err(|source| {
                error!(id = reference.id, error = %source, "Reference missing from spatial index");
                DedupError::IndexDesync {
                    id: reference.id,
                    source,
                }
            })?;
        }

        let candidates = self.neighborhood(reference);
        self.candidate_count += candidates.len();

        let decision = match self.find_conflict(reference, &candidates) {
            None => {
                self.keep_indices.push(index);
                Decision::Kept { index }
            }
            Some((neighbor_id, distance_m)) => {
                trace!(
                    id = reference.id,
                    neighbor_id,
                    distance_m,
                    "Dropping near-duplicate city"
                );
                self.remove_indices.push(index);
                self.rejections.push(Rejection {
                    index,
                    id: reference.id,
                    neighbor_id,
                    distance_m,
                });
                Decision::Removed {
                    index,
                    neighbor_id,
                    distance_m,
                }
            }
        };

        Ok(Some(decision))
    }

    /// Remaining records inside the reference's rectangular window.
    fn neighborhood(&self, reference: &CityRecord) -> Vec<&'a CityRecord> {
        let window = self
            .config
            .window
            .window(reference.lat(), self.config.min_distance_m);
        let (lat_low, lat_high) = window.lat_range(reference.lat());

        if window.dlon >= crate::window::FULL_LON_SPAN {
            return self.by_lat.range(lat_low, lat_high).map(|(_, c)| c).collect();
        }

        let lat_ids: HashSet<RecordId> = self.by_lat.range_ids(lat_low, lat_high).collect();
        if lat_ids.is_empty() {
            return Vec::new();
        }

        window
            .lon_ranges(reference.lon())
            .into_iter()
            .flat_map(|(low, high)| self.by_lon.range(low, high))
            .filter(|(id, _)| lat_ids.contains(id))
            .map(|(_, c)| c)
            .collect()
    }

    /// First candidate within the minimum distance, with its gate distance.
    fn find_conflict(
        &self,
        reference: &CityRecord,
        candidates: &[&'a CityRecord],
    ) -> Option<(RecordId, f64)> {
        let config = self.config;
        let counters = &self.counters;
        let precheck_limit = config.min_distance_m * (1.0 + HAVERSINE_PRECHECK_MARGIN);

        let too_close = |candidate: &&CityRecord| -> Option<(RecordId, f64)> {
            if config.haversine_precheck
                && haversine_distance(&reference.coord, &candidate.coord) > precheck_limit
            {
                counters.precheck_skips.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            let distance = match config.metric.distance(&reference.coord, &candidate.coord) {
                Some(d) => d,
                None => {
                    counters.degenerate.fetch_add(1, Ordering::Relaxed);
                    0.0
                }
            };
            (distance <= config.min_distance_m).then_some((candidate.id, distance))
        };

        if config.parallel && candidates.len() >= PARALLEL_THRESHOLD {
            candidates.par_iter().find_map_first(too_close)
        } else {
            candidates.iter().find_map(too_close)
        }
    }

    /// Finalize the run. Unprocessed records, if any, are left out of both lists.
    #[must_use]
    pub fn finish(self) -> DedupResult {
        let total = self.next;
        let unique = self.keep_indices.len();
        let duplicates = self.remove_indices.len();

        let stats = DedupStats {
            total_records: total,
            unique_records: unique,
            duplicate_count: duplicates,
            duplicate_ratio: if total > 0 {
                duplicates as f64 / total as f64
            } else {
                0.0
            },
            candidate_count: self.candidate_count,
            precheck_skips: self.counters.precheck_skips.into_inner(),
            degenerate_distances: self.counters.degenerate.into_inner(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        };

        DedupResult {
            keep_indices: self.keep_indices,
            remove_indices: self.remove_indices,
            rejections: self.rejections,
            stats,
        }
    }
}

/// Fail fast on coordinates the distance formulas cannot handle and on repeated ids.
fn validate_records(records: &[CityRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !record.coord.is_valid() {
            error!(id = record.id, lat = record.lat(), lon = record.lon(), "Invalid coordinate");
            return Err(DedupError::InvalidCoordinate {
                id: record.id,
                lat: record.lat(),
                lon: record.lon(),
            });
        }
        if !seen.insert(record.id) {
            return Err(DedupError::DuplicateId(record.id));
        }
    }
    Ok(())
}

/// Geospatial deduplicator.
///
/// See the [crate documentation](crate) for the order-dependence of results.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    /// Create a deduplicator with the given configuration.
    #[must_use]
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Start a step-wise run over `records`.
    ///
    /// # Errors
    /// Configuration or input validation errors.
    pub fn start<'a>(&'a self, records: &'a [CityRecord]) -> Result<DedupRun<'a>> {
        DedupRun::new(&self.config, records)
    }

    /// Deduplicate `records`, returning which input positions to keep.
    ///
    /// # Errors
    /// Configuration or input validation errors, or an index desync.
    pub fn deduplicate(&self, records: &[CityRecord]) -> Result<DedupResult> {
        self.deduplicate_with(records, &AtomicBool::new(false), |_, _| {})
    }

    /// Deduplicate with cancellation and progress reporting.
    ///
    /// `cancel` is checked once per reference record. `progress(processed, total)`
    /// is called every [`DedupConfig::report_interval`] records and at the end.
    ///
    /// # Errors
    /// As [`deduplicate`](Self::deduplicate), plus [`DedupError::Cancelled`].
    pub fn deduplicate_with<F>(
        &self,
        records: &[CityRecord],
        cancel: &AtomicBool,
        mut progress: F,
    ) -> Result<DedupResult>
    where
        F: FnMut(usize, usize),
    {
        let total = records.len();
        debug!(
            records = total,
            min_distance_m = self.config.min_distance_m,
            metric = self.config.metric.name(),
            window = ?self.config.window,
            "Starting deduplication"
        );

        let mut run = self.start(records)?;
        while run.state() == RunState::Running {
            if cancel.load(Ordering::Relaxed) {
                warn!(processed = run.processed(), total, "Deduplication cancelled");
                return Err(DedupError::Cancelled {
                    processed: run.processed(),
                });
            }
            run.step()?;
            if run.processed() % self.config.report_interval == 0 && run.processed() < total {
                progress(run.processed(), total);
            }
        }
        progress(total, total);

        let result = run.finish();
        info!(
            total = result.stats.total_records,
            unique = result.stats.unique_records,
            duplicates = result.stats.duplicate_count,
            elapsed_secs = result.stats.elapsed_secs,
            "Deduplication finished"
        );
        Ok(result)
    }

    /// Deduplicate an owned list, returning the retained records in order.
    ///
    /// # Errors
    /// As [`deduplicate`](Self::deduplicate).
    pub fn deduplicate_owned(&self, records: Vec<CityRecord>) -> Result<Vec<CityRecord>> {
        let result = self.deduplicate(&records)?;
        let keep: HashSet<usize> = result.keep_indices.into_iter().collect();
        Ok(records
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep.contains(i))
            .map(|(_, record)| record)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(id: u64, lat: f64, lon: f64) -> CityRecord {
        CityRecord::new(id, format!("city-{id}"), "XX", Coordinate::new(lat, lon).unwrap())
    }

    fn dedup(min_distance_m: f64) -> Deduplicator {
        Deduplicator::new(DedupConfig::with_min_distance(min_distance_m))
    }

    #[test]
    fn test_three_city_scenario() {
        let cities = vec![city(1, 52.0, 9.0), city(2, 52.0009, 9.0), city(3, 50.0, 9.0)];
        let result = dedup(1000.0).deduplicate(&cities).unwrap();

        // A is compared against B (still in the working set) and dropped.
        assert_eq!(result.keep_indices, vec![1, 2]);
        assert_eq!(result.remove_indices, vec![0]);
        assert_eq!(result.rejections.len(), 1);
        assert_eq!(result.rejections[0].id, 1);
        assert_eq!(result.rejections[0].neighbor_id, 2);
        assert!((99.0..102.0).contains(&result.rejections[0].distance_m));
    }

    #[test]
    fn test_empty_input() {
        let result = dedup(1000.0).deduplicate(&[]).unwrap();
        assert!(result.keep_indices.is_empty());
        assert!(result.remove_indices.is_empty());
        assert_eq!(result.stats.total_records, 0);
        assert_eq!(result.stats.duplicate_ratio, 0.0);
    }

    #[test]
    fn test_single_record() {
        let result = dedup(1000.0).deduplicate(&[city(9, 1.0, 1.0)]).unwrap();
        assert_eq!(result.keep_indices, vec![0]);
    }

    #[test]
    fn test_coincident_points_rejected() {
        let cities = vec![city(1, 10.0, 10.0), city(2, 10.0, 10.0)];
        let result = dedup(1000.0).deduplicate(&cities).unwrap();

        assert_eq!(result.keep_indices, vec![1]);
        assert_eq!(result.rejections[0].distance_m, 0.0);
        assert_eq!(result.stats.degenerate_distances, 1);
    }

    #[test]
    fn test_threshold_is_exclusive_for_acceptance() {
        let cities = vec![city(1, 52.0, 9.0), city(2, 52.0009, 9.0)];
        let d = ellipsoidal_distance(&cities[0].coord, &cities[1].coord).unwrap();

        let at = dedup(d).deduplicate(&cities).unwrap();
        assert_eq!(at.keep_indices, vec![1]);

        let below = dedup(d * 0.999).deduplicate(&cities).unwrap();
        assert_eq!(below.keep_indices, vec![0, 1]);
    }

    #[test]
    fn test_across_antimeridian() {
        let cities = vec![city(1, -16.5, 179.9995), city(2, -16.5, -179.9995)];
        let result = dedup(1000.0).deduplicate(&cities).unwrap();
        assert_eq!(result.keep_indices, vec![1]);
    }

    #[test]
    fn test_near_pole() {
        let cities = vec![city(1, 89.9999, 0.0), city(2, 89.9999, 170.0)];
        let result = dedup(1000.0).deduplicate(&cities).unwrap();
        assert_eq!(result.keep_indices, vec![1]);
    }

    #[test]
    fn test_invalid_coordinate_fails_fast() {
        let mut bad = city(5, 0.0, 0.0);
        bad.coord = Coordinate::new_unchecked(f64::NAN, 0.0);
        let err = dedup(1000.0).deduplicate(&[city(1, 0.0, 0.0), bad]).unwrap_err();
        assert!(matches!(err, DedupError::InvalidCoordinate { id: 5, .. }));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = dedup(1000.0)
            .deduplicate(&[city(1, 0.0, 0.0), city(1, 5.0, 5.0)])
            .unwrap_err();
        assert!(matches!(err, DedupError::DuplicateId(1)));
    }

    #[test]
    fn test_invalid_config() {
        for min in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = dedup(min).deduplicate(&[]).unwrap_err();
            assert!(matches!(err, DedupError::InvalidConfig(_)), "{min}");
        }

        let fixed = DedupConfig::default().window(WindowStrategy::Fixed { dlat: 0.0, dlon: 1.0 });
        assert!(fixed.validate().is_err());
        assert!(DedupConfig::default().report_interval(0).validate().is_err());
    }

    #[test]
    fn test_cancellation() {
        let cities: Vec<_> = (0..10).map(|i| city(i, i as f64, 0.0)).collect();
        let cancel = AtomicBool::new(true);
        let err = dedup(1000.0)
            .deduplicate_with(&cities, &cancel, |_, _| {})
            .unwrap_err();
        assert!(matches!(err, DedupError::Cancelled { processed: 0 }));
    }

    #[test]
    fn test_progress_reported() {
        let cities: Vec<_> = (0..10).map(|i| city(i, i as f64, 0.0)).collect();
        let deduplicator =
            Deduplicator::new(DedupConfig::with_min_distance(1000.0).report_interval(4));
        let mut calls = Vec::new();
        deduplicator
            .deduplicate_with(&cities, &AtomicBool::new(false), |done, total| {
                calls.push((done, total))
            })
            .unwrap();
        assert_eq!(calls, vec![(4, 10), (8, 10), (10, 10)]);
    }

    #[test]
    fn test_step_wise_run() {
        let cities = vec![city(1, 52.0, 9.0), city(2, 52.0009, 9.0)];
        let deduplicator = dedup(1000.0);
        let mut run = deduplicator.start(&cities).unwrap();

        assert_eq!(run.state(), RunState::Running);
        assert_eq!(run.remaining(), 2);
        assert!(matches!(
            run.step().unwrap(),
            Some(Decision::Removed { index: 0, neighbor_id: 2, .. })
        ));
        assert_eq!(run.remaining(), 1);
        assert_eq!(run.step().unwrap(), Some(Decision::Kept { index: 1 }));
        assert_eq!(run.state(), RunState::Done);
        assert_eq!(run.step().unwrap(), None);

        let result = run.finish();
        assert_eq!(result.stats.total_records, 2);
        assert_eq!(result.stats.duplicate_count, 1);
        assert_eq!(result.stats.duplicate_ratio, 0.5);
    }

    #[test]
    fn test_haversine_metric_and_precheck_agree() {
        let cities: Vec<_> = (0..50)
            .map(|i| city(i, 48.0 + (i % 7) as f64 * 0.004, 11.0 + (i / 7) as f64 * 0.006))
            .collect();

        let base = dedup(600.0).deduplicate(&cities).unwrap();
        let prechecked = Deduplicator::new(DedupConfig::with_min_distance(600.0).haversine_precheck(true))
            .deduplicate(&cities)
            .unwrap();
        assert_eq!(base.keep_indices, prechecked.keep_indices);
        assert!(prechecked.stats.precheck_skips > 0);

        let haversine = Deduplicator::new(
            DedupConfig::with_min_distance(600.0).metric(DistanceMetric::Haversine),
        )
        .deduplicate(&cities)
        .unwrap();
        assert!(!haversine.keep_indices.is_empty());
    }

    #[test]
    fn test_parallel_matches_sequential() {
        // A dense grid so neighborhoods exceed the parallel threshold.
        let cities: Vec<_> = (0..900)
            .map(|i| city(i, 40.0 + (i % 30) as f64 * 0.0005, 2.0 + (i / 30) as f64 * 0.0005))
            .collect();

        let config = DedupConfig::with_min_distance(300.0);
        let parallel = Deduplicator::new(config.clone().parallel(true))
            .deduplicate(&cities)
            .unwrap();
        let sequential = Deduplicator::new(config.parallel(false))
            .deduplicate(&cities)
            .unwrap();

        assert_eq!(parallel.keep_indices, sequential.keep_indices);
        assert!(parallel.stats.candidate_count > PARALLEL_THRESHOLD);

        let neighbors = |r: &DedupResult| {
            r.rejections
                .iter()
                .map(|rej| (rej.id, rej.neighbor_id, rej.distance_m))
                .collect::<Vec<_>>()
        };
        assert!(!parallel.rejections.is_empty());
        assert_eq!(neighbors(&parallel), neighbors(&sequential));
    }

    #[test]
    fn test_deduplicate_owned_and_survivors() {
        let cities = vec![city(1, 52.0, 9.0), city(2, 52.0009, 9.0), city(3, 50.0, 9.0)];
        let d = dedup(1000.0);

        let result = d.deduplicate(&cities).unwrap();
        let survivors: Vec<u64> = result.survivors(&cities).iter().map(|c| c.id).collect();
        let owned: Vec<u64> = d.deduplicate_owned(cities).unwrap().iter().map(|c| c.id).collect();

        assert_eq!(survivors, vec![2, 3]);
        assert_eq!(owned, survivors);
    }
}
