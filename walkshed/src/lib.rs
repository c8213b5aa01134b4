//! Half-mile walking buffers around transit stops, assembled into a web map with one layer
//! per agency.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod buffer;
mod config;
mod error;
mod export;
pub mod major;
mod map;
pub mod projection;
mod source;
pub mod sphere;

pub use buffer::{build_buffers, union_all, BufferSet, BufferSpec, WALKING_RADIUS_METERS};
pub use config::{AgencyConfig, Color, MajorStopConfig, MapConfig, TileSource, ViewConfig};
pub use error::BufferError;
pub use export::{layer_to_geojson, write_site};
pub use map::{build_map, AgencyFailure, AgencyLayer, MapHandle, Style, View};
pub use projection::Crs;
pub use source::{DirSource, MemorySource, StopSource};
