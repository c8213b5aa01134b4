use geo::{Area, BooleanOps, Coord, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use crate::projection::{self, Crs};
use crate::sphere::Sphere;
use crate::BufferError;

/// How big each stop's buffer is, and how finely the circle is approximated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSpec {
    pub radius_meters: f64,
    pub sides: usize,
}

/// Half a mile
pub const WALKING_RADIUS_METERS: f64 = 804.672;

impl Default for BufferSpec {
    fn default() -> Self {
        Self {
            radius_meters: WALKING_RADIUS_METERS,
            sides: 12,
        }
    }
}

/// One circle per stop, kept as separate parts until `dissolve` merges them.
#[derive(Clone, Debug)]
pub struct BufferSet {
    parts: MultiPolygon,
    crs: Crs,
}

impl BufferSet {
    /// Builds circles around (longitude, latitude) coordinates, in EPSG:4326.
    pub fn around<I: IntoIterator<Item = Coord>>(
        centers: I,
        spec: BufferSpec,
        sphere: Sphere,
    ) -> Result<Self, BufferError> {
        let mut parts = Vec::new();
        for center in centers {
            parts.push(sphere.circular(center, spec.radius_meters, spec.sides)?);
        }
        Ok(Self {
            parts: MultiPolygon::new(parts),
            crs: Crs::Epsg4326,
        })
    }

    pub fn len(&self) -> usize {
        self.parts.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.0.is_empty()
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn parts(&self) -> &MultiPolygon {
        &self.parts
    }

    /// Reprojects every part in one pass.
    pub fn reproject(&self, to: Crs) -> Result<Self, BufferError> {
        Ok(Self {
            parts: projection::transform(&self.parts, self.crs, to)?,
            crs: to,
        })
    }

    /// The union of all parts. Overlapping circles merge into one polygon.
    pub fn dissolve(&self) -> MultiPolygon {
        union_all(self.parts.0.iter().cloned())
    }

    /// Parts with no area left, like circles near a pole flattened by Web Mercator. Dissolving
    /// drops them.
    pub fn collapsed_parts(&self) -> usize {
        self.parts
            .0
            .iter()
            .filter(|p| p.unsigned_area() == 0.0)
            .count()
    }

    pub fn into_parts(self) -> MultiPolygon {
        self.parts
    }
}

/// Unions polygons pairwise, a round at a time, until one shape is left.
pub fn union_all<I: IntoIterator<Item = Polygon>>(polygons: I) -> MultiPolygon {
    let mut layer: Vec<MultiPolygon> = polygons
        .into_iter()
        .map(|p| MultiPolygon::new(vec![p]))
        .collect();
    while layer.len() > 1 {
        let mut next = Vec::with_capacity((layer.len() + 1) / 2);
        let mut iter = layer.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        layer = next;
    }
    layer.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// The whole per-agency geometry step: circles around every (longitude, latitude) center,
/// reprojected to `to`, then optionally dissolved.
pub fn build_buffers<I: IntoIterator<Item = Coord>>(
    centers: I,
    spec: BufferSpec,
    sphere: Sphere,
    to: Crs,
    dissolve: bool,
) -> Result<MultiPolygon, BufferError> {
    let buffers = BufferSet::around(centers, spec, sphere)?.reproject(to)?;
    let collapsed = buffers.collapsed_parts();
    if collapsed > 0 {
        warn!(
            "{collapsed} of {} buffers have no area in {to}; their stops are too close to a pole",
            buffers.len()
        );
    }
    if dissolve {
        Ok(buffers.dissolve())
    } else {
        Ok(buffers.into_parts())
    }
}
