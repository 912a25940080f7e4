//! JSON-lines trajectory replay.
//!
//! Each non-empty line is one [`TrajectoryRecord`]:
//!
//! ```text
//! {"timestamp_us": 0, "points": [[1.0, 0.0, 0.2], ...]}
//! {"timestamp_us": 100000, "delta": [0.1, 0.0, 0.0, 0.0, 0.0, 0.01]}
//! {"timestamp_us": 200000, "delta": [...], "sigmas": [...], "points": [...]}
//! ```
//!
//! A record without `delta` carries the scan for key 0.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{Covariance6, PointCloud3D, Pose3D, covariance_from_sigmas};

/// Odometry sigma used when a record has none.
pub const DEFAULT_SIGMA: f64 = 0.01;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One odometry step and/or scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRecord {
    /// Capture time in microseconds.
    pub timestamp_us: u64,

    /// Motion since the previous record `[x, y, z, roll, pitch, yaw]`.
    #[serde(default)]
    pub delta: Option<[f64; 6]>,

    /// Per-axis standard deviations of `delta`.
    #[serde(default)]
    pub sigmas: Option<[f64; 6]>,

    /// Body-frame scan points.
    #[serde(default)]
    pub points: Vec<[f64; 3]>,
}

impl TrajectoryRecord {
    pub fn delta_pose(&self) -> Option<Pose3D> {
        self.delta
            .map(|[x, y, z, roll, pitch, yaw]| Pose3D::from_xyz_rpy(x, y, z, roll, pitch, yaw))
    }

    pub fn covariance(&self) -> Covariance6 {
        covariance_from_sigmas(&self.sigmas.unwrap_or([DEFAULT_SIGMA; 6]))
    }

    /// Scan carried by this record, `None` if it has no points.
    pub fn scan(&self) -> Option<PointCloud3D> {
        if self.points.is_empty() {
            return None;
        }
        let points = self
            .points
            .iter()
            .map(|[x, y, z]| Point3::new(*x, *y, *z))
            .collect();
        Some(PointCloud3D::from_points(points, self.timestamp_us))
    }
}

/// Streaming reader over a JSON-lines trajectory.
pub struct TrajectoryReader<R> {
    lines: std::io::Lines<R>,
    line: usize,
}

impl TrajectoryReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, ReplayError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> TrajectoryReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for TrajectoryReader<R> {
    type Item = Result<TrajectoryRecord, ReplayError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            let line = self.line;
            return Some(
                serde_json::from_str(&text).map_err(|source| ReplayError::Parse { line, source }),
            );
        }
    }
}

/// Read a whole trajectory file.
pub fn read_trajectory(path: &Path) -> Result<Vec<TrajectoryRecord>, ReplayError> {
    TrajectoryReader::open(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    #[test]
    fn test_reads_records_and_skips_blank_lines() {
        let text = r#"{"timestamp_us": 5, "points": [[1.0, 2.0, 3.0]]}

{"timestamp_us": 10, "delta": [0.5, 0.0, 0.0, 0.0, 0.0, 0.1], "sigmas": [0.1, 0.1, 0.1, 0.2, 0.2, 0.2]}
"#;
        let records: Vec<_> = TrajectoryReader::new(Cursor::new(text))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);

        let scan = records[0].scan().unwrap();
        assert_eq!(scan.timestamp_us, 5);
        assert!(records[0].delta_pose().is_none());

        let delta = records[1].delta_pose().unwrap();
        assert_relative_eq!(delta.translation().x, 0.5);
        assert_relative_eq!(records[1].covariance()[(3, 3)], 0.04, epsilon = 1e-12);
        assert!(records[1].scan().is_none());
    }

    #[test]
    fn test_default_sigmas() {
        let record: TrajectoryRecord = serde_json::from_str(r#"{"timestamp_us": 1}"#).unwrap();
        assert_relative_eq!(record.covariance()[(0, 0)], DEFAULT_SIGMA * DEFAULT_SIGMA);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let text = "{\"timestamp_us\": 1}\nnot json\n";
        let results: Vec<_> = TrajectoryReader::new(Cursor::new(text)).collect();
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ReplayError::Parse { line: 2, .. })));
    }
}
