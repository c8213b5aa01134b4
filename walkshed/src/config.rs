use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::major::DuplicatedRoutes;
use crate::projection::Crs;
use crate::BufferSpec;

/// Everything that shapes the map. The defaults describe the Bay Area walkshed map; a JSON
/// file can override any part of it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// The id of the page element the map is mounted on
    pub target: String,
    pub renderer: String,
    pub view: ViewConfig,
    pub base_layer: TileSource,
    pub buffer: BufferSpec,
    /// Union each agency's circles, instead of keeping one part per stop
    pub dissolve: bool,
    /// Abort on the first agency that fails, instead of leaving its layer out
    pub strict: bool,
    /// Layers are drawn in this order, the first one at the bottom
    pub agencies: Vec<AgencyConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// [lon1, lat1, lon2, lat2]; the view is centered on the middle of this
    pub extent: [f64; 4],
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub projection: Crs,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileSource {
    pub name: String,
    /// With {z}, {x}, {y} placeholders
    pub url: String,
    pub attribution: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgencyConfig {
    /// Short name, used for output file names
    pub name: String,
    pub label: String,
    /// The agency's stop file, relative to the stop directory
    pub path: String,
    pub color: Color,
}

/// An opaque color like #CA2163
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn hex(hex: &str) -> Result<Self> {
        let digits = hex
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("Color {hex:?} doesn't start with #"))?;
        if digits.len() != 6 || !digits.is_ascii() {
            bail!("Color {hex:?} isn't #RRGGBB");
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| anyhow!("Color {hex:?} isn't #RRGGBB"))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(x: String) -> Result<Self> {
        Self::hex(&x)
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            target: "map".to_string(),
            renderer: "canvas".to_string(),
            view: ViewConfig::default(),
            base_layer: TileSource::default(),
            buffer: BufferSpec::default(),
            dissolve: true,
            strict: false,
            agencies: bay_area_agencies(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            // San Francisco
            extent: [-122.384591, 37.703211, -122.510850, 37.808675],
            zoom: 12.0,
            min_zoom: 9.0,
            max_zoom: 15.0,
            projection: Crs::Epsg3857,
        }
    }
}

impl Default for TileSource {
    fn default() -> Self {
        Self {
            name: "toner".to_string(),
            url: "https://tiles.stadiamaps.com/tiles/stamen_toner/{z}/{x}/{y}.png".to_string(),
            attribution: "Map tiles by Stamen Design, under CC BY 4.0. Data by OpenStreetMap, under ODbL.".to_string(),
        }
    }
}

fn bay_area_agencies() -> Vec<AgencyConfig> {
    [
        ("sfmta", "SFMTA", (0xCA, 0x21, 0x63)),
        ("actransit", "AC Transit", (0x06, 0x67, 0x4B)),
        ("samtrans", "SamTrans", (0x00, 0x52, 0x9B)),
        ("vta", "VTA", (0x00, 0x58, 0x82)),
        ("bart", "BART", (0x00, 0xAD, 0xEF)),
        ("caltrain", "Caltrain", (0xE0, 0x3A, 0x3E)),
    ]
    .into_iter()
    .map(|(name, label, (r, g, b))| AgencyConfig {
        name: name.to_string(),
        label: label.to_string(),
        path: format!("stops/{name}.txt"),
        color: Color { r, g, b },
    })
    .collect()
}

impl ViewConfig {
    /// The middle of the extent, as (longitude, latitude)
    pub fn center(&self) -> (f64, f64) {
        let [x1, y1, x2, y2] = self.extent;
        ((x1 + x2) / 2.0, (y1 + y2) / 2.0)
    }
}

impl MapConfig {
    /// Reads overrides from a JSON file. Anything not mentioned keeps its default.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs_err::read_to_string(path)?;
        let config: MapConfig = serde_json::from_str(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.target) {
            bail!("Target element id {:?} should be alphanumeric", self.target);
        }
        if self.buffer.sides < 3 {
            bail!("A buffer needs at least 3 sides, not {}", self.buffer.sides);
        }
        if !(self.buffer.radius_meters > 0.0) || !self.buffer.radius_meters.is_finite() {
            bail!("Bad buffer radius {}", self.buffer.radius_meters);
        }
        let view = &self.view;
        if !(view.min_zoom <= view.zoom && view.zoom <= view.max_zoom) {
            bail!(
                "Zoom {} isn't between {} and {}",
                view.zoom,
                view.min_zoom,
                view.max_zoom
            );
        }
        let mut names = BTreeSet::new();
        for agency in &self.agencies {
            if !is_identifier(&agency.name) {
                bail!("Agency name {:?} can't be used as a file name", agency.name);
            }
            if !names.insert(&agency.name) {
                bail!("Agency {} is listed twice", agency.name);
            }
        }
        Ok(())
    }
}

fn is_identifier(x: &str) -> bool {
    !x.is_empty()
        && x
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Settings for picking out major transit stops from a GTFS feed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MajorStopConfig {
    /// Arrivals starting in this hour count as the morning peak
    pub am_peak_hour: u32,
    pub pm_peak_hour: u32,
    /// The longest allowed gap between arrivals in a peak hour
    pub max_headway_seconds: u32,
    /// How many frequent bus routes need to meet at a stop
    pub min_frequent_bus_routes: usize,
    pub duplicated_routes: Vec<DuplicatedRoutes>,
    /// Judge services by the calendar of the week containing this date, including
    /// calendar_dates.txt exceptions. Without it, only the days of the week in calendar.txt
    /// count.
    pub week_of: Option<NaiveDate>,
}

impl Default for MajorStopConfig {
    fn default() -> Self {
        Self {
            am_peak_hour: 8,
            pm_peak_hour: 17,
            max_headway_seconds: 15 * 60,
            min_frequent_bus_routes: 2,
            duplicated_routes: vec![DuplicatedRoutes::sfmta()],
            week_of: None,
        }
    }
}

impl MajorStopConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs_err::read_to_string(path)?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }
}
