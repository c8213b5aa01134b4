use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use geo::{Coord, MapCoords};
use serde::{Deserialize, Serialize};

use crate::BufferError;

/// The coordinate reference systems this crate can move between.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crs {
    /// Longitude, latitude in degrees
    #[serde(rename = "EPSG:4326")]
    Epsg4326,
    /// Spherical Web Mercator, in meters
    #[serde(rename = "EPSG:3857")]
    Epsg3857,
}

const RADIUS: f64 = 6_378_137.0;
const HALF_SIZE: f64 = PI * RADIUS;

impl Crs {
    pub fn code(self) -> &'static str {
        match self {
            Crs::Epsg4326 => "EPSG:4326",
            Crs::Epsg3857 => "EPSG:3857",
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Crs {
    type Err = anyhow::Error;

    fn from_str(x: &str) -> Result<Self> {
        match x {
            "EPSG:4326" => Ok(Crs::Epsg4326),
            // Old aliases for Web Mercator that still show up in configs
            "EPSG:3857" | "EPSG:900913" | "EPSG:102100" => Ok(Crs::Epsg3857),
            _ => bail!("Unsupported CRS {x}"),
        }
    }
}

/// Moves every coordinate of a geometry from one CRS to another in a single pass.
pub fn transform<G>(geometry: &G, from: Crs, to: Crs) -> Result<G, BufferError>
where
    G: MapCoords<f64, f64, Output = G>,
{
    geometry.try_map_coords(move |c| transform_coord(c, from, to))
}

pub fn transform_coord(c: Coord, from: Crs, to: Crs) -> Result<Coord, BufferError> {
    let out = match (from, to) {
        (Crs::Epsg4326, Crs::Epsg3857) => lonlat_to_mercator(c),
        (Crs::Epsg3857, Crs::Epsg4326) => mercator_to_lonlat(c),
        _ => c,
    };
    if !out.x.is_finite() || !out.y.is_finite() {
        return Err(BufferError::ReprojectionFailure {
            from: from.to_string(),
            to: to.to_string(),
            x: c.x,
            y: c.y,
        });
    }
    Ok(out)
}

fn lonlat_to_mercator(c: Coord) -> Coord {
    let x = RADIUS * c.x.to_radians();
    let y = RADIUS * (PI / 4.0 + c.y.to_radians() / 2.0).tan().ln();
    // Near the poles, the projection blows up
    Coord {
        x,
        y: y.clamp(-HALF_SIZE, HALF_SIZE),
    }
}

fn mercator_to_lonlat(c: Coord) -> Coord {
    Coord {
        x: (c.x / RADIUS).to_degrees(),
        y: (2.0 * (c.y / RADIUS).exp().atan() - PI / 2.0).to_degrees(),
    }
}
