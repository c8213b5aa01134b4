use std::fmt;

use gtfs::MalformedStop;

/// The ways building one agency's buffer layer can go wrong.
#[derive(Debug)]
pub enum BufferError {
    MissingStopFile {
        agency: String,
        path: String,
    },
    MissingColumn {
        agency: String,
        column: &'static str,
    },
    /// Not fatal; the row is skipped.
    MalformedStopRecord {
        agency: String,
        row: usize,
        problem: MalformedStop,
    },
    ReprojectionFailure {
        from: String,
        to: String,
        x: f64,
        y: f64,
    },
    BadBufferShape {
        sides: usize,
        radius_meters: f64,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BufferError::MissingStopFile { agency, path } => {
                write!(f, "{agency}: stop file {path} doesn't exist")
            }
            BufferError::MissingColumn { agency, column } => {
                write!(f, "{agency}: stop file has no {column} column")
            }
            BufferError::MalformedStopRecord {
                agency,
                row,
                problem,
            } => write!(f, "{agency}: skipping stop on row {row}: {problem}"),
            BufferError::ReprojectionFailure { from, to, x, y } => {
                write!(f, "can't reproject ({x}, {y}) from {from} to {to}")
            }
            BufferError::BadBufferShape {
                sides,
                radius_meters,
            } => write!(
                f,
                "can't approximate a circle of radius {radius_meters}m with {sides} sides"
            ),
        }
    }
}

impl std::error::Error for BufferError {}
