use std::io::Cursor;

use abstutil::Timer;
use anyhow::{Context, Result};
use geo::{Coord, MultiPolygon};
use gtfs::MissingColumn;
use serde::{Deserialize, Serialize};

use crate::config::{AgencyConfig, Color, MapConfig, TileSource};
use crate::projection::{self, Crs};
use crate::sphere::WGS84_SPHERE;
use crate::{build_buffers, BufferError, StopSource};

/// Everything needed to draw the map: a tile layer underneath one buffer layer per agency.
pub struct MapHandle {
    pub target: String,
    pub renderer: String,
    pub view: View,
    pub base_layer: TileSource,
    /// Bottom to top
    pub layers: Vec<AgencyLayer>,
    /// Agencies whose layer couldn't be built
    pub failures: Vec<AgencyFailure>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct View {
    /// In `projection` coordinates
    pub center: [f64; 2],
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub projection: Crs,
}

pub struct AgencyLayer {
    pub agency: AgencyConfig,
    pub style: Style,
    /// In the view's projection
    pub geometry: MultiPolygon,
    /// How many stops went into the geometry
    pub stops: usize,
    /// Rows of the stop file that had no usable coordinate
    pub skipped_rows: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub stroke_color: Color,
    pub stroke_width: f64,
    pub fill_color: Color,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgencyFailure {
    pub agency: String,
    pub error: String,
}

impl Style {
    pub fn solid(color: Color) -> Self {
        Self {
            stroke_color: color,
            stroke_width: 1.0,
            fill_color: color,
        }
    }
}

impl MapHandle {
    pub fn layer(&self, agency: &str) -> Option<&AgencyLayer> {
        self.layers.iter().find(|l| l.agency.name == agency)
    }
}

impl AgencyLayer {
    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }
}

/// Reads every agency's stops from `sources` and assembles the map. Nothing is cached
/// between calls.
pub fn build_map(
    config: &MapConfig,
    sources: &dyn StopSource,
    timer: &mut Timer,
) -> Result<MapHandle> {
    config.validate()?;

    let (lon, lat) = config.view.center();
    let center = projection::transform_coord(
        Coord { x: lon, y: lat },
        Crs::Epsg4326,
        config.view.projection,
    )?;
    let view = View {
        center: [center.x, center.y],
        zoom: config.view.zoom,
        min_zoom: config.view.min_zoom,
        max_zoom: config.view.max_zoom,
        projection: config.view.projection,
    };

    let mut layers = Vec::new();
    let mut failures = Vec::new();
    for agency in &config.agencies {
        let step = format!("build {} layer", agency.name);
        timer.start(&step);
        let result = build_agency_layer(config, agency, sources);
        timer.stop(&step);

        match result {
            Ok(layer) => layers.push(layer),
            Err(err) => {
                if config.strict {
                    return Err(err.context(format!("building the {} layer", agency.name)));
                }
                error!("Leaving out the {} layer: {err:#}", agency.name);
                failures.push(AgencyFailure {
                    agency: agency.name.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    Ok(MapHandle {
        target: config.target.clone(),
        renderer: config.renderer.clone(),
        view,
        base_layer: config.base_layer.clone(),
        layers,
        failures,
    })
}

fn build_agency_layer(
    config: &MapConfig,
    agency: &AgencyConfig,
    sources: &dyn StopSource,
) -> Result<AgencyLayer> {
    let bytes = sources
        .read(&agency.path)?
        .ok_or_else(|| BufferError::MissingStopFile {
            agency: agency.name.clone(),
            path: agency.path.clone(),
        })?;

    let parsed = match gtfs::parse_stop_file(Cursor::new(bytes)) {
        Ok(parsed) => parsed,
        Err(err) => {
            if let Some(MissingColumn(column)) = err.downcast_ref::<MissingColumn>() {
                return Err(BufferError::MissingColumn {
                    agency: agency.name.clone(),
                    column: *column,
                }
                .into());
            }
            return Err(err.context(format!("reading {}", agency.path)));
        }
    };
    for malformed in &parsed.malformed {
        warn!(
            "{}",
            BufferError::MalformedStopRecord {
                agency: agency.name.clone(),
                row: malformed.row,
                problem: malformed.problem.clone(),
            }
        );
    }

    let geometry = build_buffers(
        parsed.stops.iter().map(|s| Coord {
            x: s.pos.x(),
            y: s.pos.y(),
        }),
        config.buffer,
        WGS84_SPHERE,
        config.view.projection,
        config.dissolve,
    )
    .with_context(|| format!("buffering {} stops", agency.name))?;

    info!(
        "{}: {} stops became {} polygons ({} rows skipped)",
        agency.name,
        parsed.stops.len(),
        geometry.0.len(),
        parsed.malformed.len()
    );

    Ok(AgencyLayer {
        agency: agency.clone(),
        style: Style::solid(agency.color),
        geometry,
        stops: parsed.stops.len(),
        skipped_rows: parsed.malformed.len(),
    })
}

#[cfg(test)]
mod tests {
    use geo::{BooleanOps, Contains, Point};

    use super::*;
    use crate::MemorySource;

    const MISSION: &str = "stop_id,stop_name,stop_lat,stop_lon\n\
                           1,24th St & Mission St,37.7522,-122.4184\n\
                           2,16th St & Mission St,37.7650,-122.4197\n";
    const OAKLAND: &str = "stop_id,stop_lat,stop_lon\n\
                           10,37.8044,-122.2712\n\
                           11,37.8080,-122.2690\n\
                           12,bogus,-122.2690\n";

    fn two_agencies() -> MapConfig {
        let mut config = MapConfig::default();
        config.agencies.retain(|a| a.name == "sfmta" || a.name == "actransit");
        config
    }

    fn sources() -> MemorySource {
        let mut sources = MemorySource::new();
        sources.insert("stops/sfmta.txt", MISSION);
        sources.insert("stops/actransit.txt", OAKLAND);
        sources
    }

    #[test]
    fn assemble_layers() {
        let map = build_map(&two_agencies(), &sources(), &mut Timer::throwaway()).unwrap();
        assert_eq!(map.target, "map");
        assert!(map.failures.is_empty());
        assert_eq!(map.layers.len(), 2);

        let sfmta = map.layer("sfmta").unwrap();
        assert_eq!(sfmta.stops, 2);
        assert_eq!(sfmta.skipped_rows, 0);
        assert_eq!(sfmta.style.fill_color.to_string(), "#CA2163");
        assert_eq!(sfmta.style.stroke_width, 1.0);

        let actransit = map.layer("actransit").unwrap();
        assert_eq!(actransit.stops, 2);
        assert_eq!(actransit.skipped_rows, 1);

        // Disjoint stop sets don't interact
        assert!(sfmta
            .geometry
            .intersection(&actransit.geometry)
            .0
            .is_empty());

        // Geometry is in Web Mercator
        let stop = projection::transform_coord(
            Coord {
                x: -122.4184,
                y: 37.7522,
            },
            Crs::Epsg4326,
            Crs::Epsg3857,
        )
        .unwrap();
        assert!(sfmta.geometry.contains(&Point::from(stop)));

        assert_eq!(map.view.zoom, 12.0);
        assert!((map.view.center[0] - -13630817.89).abs() < 1.0);
    }

    #[test]
    fn one_agency_missing_doesnt_affect_the_other() {
        let full = build_map(&two_agencies(), &sources(), &mut Timer::throwaway()).unwrap();

        let mut partial_sources = sources();
        partial_sources.remove("stops/actransit.txt");
        let partial =
            build_map(&two_agencies(), &partial_sources, &mut Timer::throwaway()).unwrap();
        assert_eq!(partial.layers.len(), 1);
        assert_eq!(partial.failures.len(), 1);
        assert_eq!(partial.failures[0].agency, "actransit");
        assert!(partial.failures[0].error.contains("doesn't exist"));

        assert_eq!(
            full.layer("sfmta").unwrap().geometry,
            partial.layer("sfmta").unwrap().geometry
        );
    }

    #[test]
    fn strict_mode_fails_fast() {
        let mut config = two_agencies();
        config.strict = true;
        let mut partial_sources = sources();
        partial_sources.remove("stops/sfmta.txt");
        let err = build_map(&config, &partial_sources, &mut Timer::throwaway())
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<BufferError>(),
            Some(BufferError::MissingStopFile { .. })
        ));
    }

    #[test]
    fn missing_column_fails_the_agency() {
        let mut sources = sources();
        sources.insert("stops/sfmta.txt", "stop_id,lat,lon\n1,37.0,-122.0\n");
        let map = build_map(&two_agencies(), &sources, &mut Timer::throwaway()).unwrap();
        assert_eq!(map.layers.len(), 1);
        assert!(map.failures[0].error.contains("stop_lon"));
    }

    #[test]
    fn empty_stop_file_is_an_empty_layer() {
        let mut sources = sources();
        sources.insert("stops/sfmta.txt", "stop_id,stop_lat,stop_lon\n");
        let map = build_map(&two_agencies(), &sources, &mut Timer::throwaway()).unwrap();
        assert!(map.failures.is_empty());
        let sfmta = map.layer("sfmta").unwrap();
        assert!(sfmta.is_empty());
        assert_eq!(sfmta.stops, 0);
    }

    #[test]
    fn undissolved_keeps_one_part_per_stop() {
        let mut config = two_agencies();
        config.dissolve = false;
        let map = build_map(&config, &sources(), &mut Timer::throwaway()).unwrap();
        // The two Mission stops overlap, but stay separate
        assert_eq!(map.layer("sfmta").unwrap().geometry.0.len(), 2);
    }
}
