use std::path::Path;

use abstutil::Timer;
use anyhow::Result;
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, GeoJson};
use serde::Serialize;

use crate::config::TileSource;
use crate::map::{AgencyFailure, AgencyLayer, MapHandle, Style, View};
use crate::projection::Crs;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Writes the map as a static site: `index.html`, `map.json`, and one GeoJSON file per
/// agency under `layers/`.
pub fn write_site<P: AsRef<Path>>(map: &MapHandle, dir: P, timer: &mut Timer) -> Result<()> {
    let dir = dir.as_ref();
    timer.start("write static site");
    fs_err::create_dir_all(dir.join("layers"))?;

    for layer in &map.layers {
        let gj = layer_to_geojson(layer, map.view.projection);
        fs_err::write(dir.join(layer_file(layer)), serde_json::to_string(&gj)?)?;
    }

    let manifest = serde_json::to_string_pretty(&Manifest::new(map))?;
    fs_err::write(dir.join("map.json"), &manifest)?;

    // The manifest is inlined into a script tag
    let html = INDEX_HTML
        .replace("__TARGET__", &map.target)
        .replace("__MANIFEST__", &manifest.replace("</", "<\\/"));
    fs_err::write(dir.join("index.html"), html)?;
    timer.stop("write static site");

    info!(
        "Wrote {} layers to {}",
        map.layers.len(),
        dir.display()
    );
    Ok(())
}

fn layer_file(layer: &AgencyLayer) -> String {
    format!("layers/{}.geojson", layer.agency.name)
}

/// One MultiPolygon feature, or no features at all if the agency had no stops. The CRS is
/// named with the old-style `crs` member, since the coordinates usually aren't WGS84.
pub fn layer_to_geojson(layer: &AgencyLayer, crs: Crs) -> GeoJson {
    let mut features = Vec::new();
    if !layer.is_empty() {
        let mut feature = Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(multipolygon_to_geojson(
                &layer.geometry,
            ))),
            id: None,
            properties: None,
            foreign_members: None,
        };
        feature.set_property("agency", layer.agency.name.clone());
        feature.set_property("label", layer.agency.label.clone());
        feature.set_property("color", layer.agency.color.to_string());
        feature.set_property("stops", layer.stops);
        feature.set_property("skipped_rows", layer.skipped_rows);
        features.push(feature);
    }

    let mut foreign_members = serde_json::Map::new();
    foreign_members.insert(
        "crs".to_string(),
        serde_json::json!({
            "type": "name",
            "properties": {
                "name": crs.code().replace("EPSG:", "urn:ogc:def:crs:EPSG::"),
            },
        }),
    );
    GeoJson::FeatureCollection(FeatureCollection {
        features,
        bbox: None,
        foreign_members: Some(foreign_members),
    })
}

fn multipolygon_to_geojson(multi: &MultiPolygon) -> geojson::Value {
    geojson::Value::MultiPolygon(
        multi
            .0
            .iter()
            .map(|polygon| {
                std::iter::once(polygon.exterior())
                    .chain(polygon.interiors())
                    .map(|ring| ring.coords().map(|c| vec![c.x, c.y]).collect())
                    .collect()
            })
            .collect(),
    )
}

#[derive(Serialize)]
struct Manifest<'a> {
    target: &'a str,
    renderer: &'a str,
    view: &'a View,
    base_layer: &'a TileSource,
    layers: Vec<ManifestLayer<'a>>,
    failures: &'a [AgencyFailure],
}

#[derive(Serialize)]
struct ManifestLayer<'a> {
    name: &'a str,
    label: &'a str,
    file: String,
    style: &'a Style,
    stops: usize,
    skipped_rows: usize,
}

impl<'a> Manifest<'a> {
    fn new(map: &'a MapHandle) -> Self {
        Self {
            target: &map.target,
            renderer: &map.renderer,
            view: &map.view,
            base_layer: &map.base_layer,
            layers: map
                .layers
                .iter()
                .map(|layer| ManifestLayer {
                    name: &layer.agency.name,
                    label: &layer.agency.label,
                    file: layer_file(layer),
                    style: &layer.style,
                    stops: layer.stops,
                    skipped_rows: layer.skipped_rows,
                })
                .collect(),
            failures: &map.failures,
        }
    }
}
