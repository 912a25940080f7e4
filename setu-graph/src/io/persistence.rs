//! Map persistence.
//!
//! ## File Format
//!
//! Each save produces:
//! - `{map_file}` - ASCII PLY point cloud, overwritten on every save
//! - `{location_file}` - one line appended per save:
//!   `[New Map] location:x,y,z; at time:YYYY-MM-DD-HH-MM-SS.`

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::PersistenceSection;
use crate::core::types::PointCloud3D;

const LOCATION_PREFIX: &str = "[New Map] location:";
const TIME_MARKER: &str = "; at time:";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed location line: {0}")]
    Malformed(String),
}

/// Destination for saved maps.
pub trait MapSink {
    /// Persist `cloud` together with the robot location `(x, y)` and a
    /// local timestamp string.
    fn save(
        &mut self,
        cloud: &PointCloud3D,
        location: (f64, f64),
        timestamp: &str,
    ) -> Result<(), PersistenceError>;
}

/// Writes the map as PLY and appends robot locations to a text log.
#[derive(Debug, Clone)]
pub struct PlyMapWriter {
    output_dir: PathBuf,
    map_file: String,
    location_file: String,
}

impl PlyMapWriter {
    pub fn new(output_dir: impl Into<PathBuf>, map_file: &str, location_file: &str) -> Self {
        Self {
            output_dir: output_dir.into(),
            map_file: map_file.to_string(),
            location_file: location_file.to_string(),
        }
    }

    pub fn from_config(config: &PersistenceSection) -> Self {
        Self::new(&config.output_dir, &config.map_file, &config.location_file)
    }

    pub fn map_path(&self) -> PathBuf {
        self.output_dir.join(&self.map_file)
    }

    pub fn location_path(&self) -> PathBuf {
        self.output_dir.join(&self.location_file)
    }

    /// Most recent location written to the location log, if any.
    pub fn last_location(&self) -> Result<Option<(f64, f64, f64)>, PersistenceError> {
        let path = self.location_path();
        if !path.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut last = None;
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                last = Some(line);
            }
        }

        last.map(|line| parse_location(&line)).transpose()
    }
}

impl MapSink for PlyMapWriter {
    fn save(
        &mut self,
        cloud: &PointCloud3D,
        location: (f64, f64),
        timestamp: &str,
    ) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.output_dir)?;
        write_ply(&self.map_path(), cloud)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.location_path())?;
        writeln!(file, "{}", format_location(location.0, location.1, 0.0, timestamp))?;
        Ok(())
    }
}

/// Write `cloud` as an ASCII PLY file.
pub fn write_ply(path: &Path, cloud: &PointCloud3D) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", cloud.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "end_header")?;
    for p in cloud.iter() {
        writeln!(writer, "{} {} {}", p.x as f32, p.y as f32, p.z as f32)?;
    }
    writer.flush()
}

fn format_location(x: f64, y: f64, z: f64, timestamp: &str) -> String {
    format!("{LOCATION_PREFIX}{x:.4},{y:.4},{z:.4}{TIME_MARKER}{timestamp}.")
}

fn parse_location(line: &str) -> Result<(f64, f64, f64), PersistenceError> {
    let malformed = || PersistenceError::Malformed(line.to_string());

    let rest = line.strip_prefix(LOCATION_PREFIX).ok_or_else(malformed)?;
    let (coords, _) = rest.split_once(TIME_MARKER).ok_or_else(malformed)?;
    let values: Vec<f64> = coords
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| malformed())?;

    match values.as_slice() {
        [x, y, z] => Ok((*x, *y, *z)),
        _ => Err(malformed()),
    }
}
