use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteID(String);

impl RouteID {
    pub fn new<S: Into<String>>(x: S) -> Self {
        Self(x.into())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Route {
    pub route_id: RouteID,
    pub route_type: RouteType,
    pub short_name: Option<String>,
    pub long_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RouteType {
    Tram,
    Subway,
    Rail,
    Bus,
    Ferry,
    CableTram,
    AerialLift,
    Furnicular,
    Trolleybus,
    Monorail,
}

impl RouteType {
    /// Understands the basic GTFS codes and the extended (Google "Hierarchical Vehicle
    /// Type") ones, collapsed onto the basic categories.
    pub fn from_code(code: u16) -> Option<Self> {
        use RouteType::*;
        Some(match code {
            0 => Tram,
            1 => Subway,
            2 => Rail,
            3 => Bus,
            4 => Ferry,
            5 => CableTram,
            6 => AerialLift,
            7 => Furnicular,
            11 => Trolleybus,
            12 => Monorail,
            100..=199 => Rail,
            200..=299 | 700..=799 => Bus,
            400..=499 => Subway,
            800..=899 => Trolleybus,
            900..=999 => Tram,
            1000..=1099 | 1200..=1299 => Ferry,
            1300..=1399 => AerialLift,
            1400..=1499 => Furnicular,
            _ => return None,
        })
    }

    pub fn is_bus(self) -> bool {
        self == RouteType::Bus
    }
}

/// Keeps file order
pub fn load<R: std::io::Read>(reader: R) -> Result<Vec<Route>> {
    let mut routes = Vec::new();
    let mut seen = BTreeSet::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if !seen.insert(rec.route_id.clone()) {
            bail!("Duplicate {:?}", rec.route_id);
        }
        routes.push(Route {
            route_id: rec.route_id,
            route_type: rec.route_type,
            short_name: rec.route_short_name,
            long_name: rec.route_long_name,
            description: rec.route_desc,
        });
    }
    Ok(routes)
}

#[derive(Deserialize)]
struct Record {
    route_id: RouteID,
    #[serde(deserialize_with = "parse_route_type")]
    route_type: RouteType,
    route_short_name: Option<String>,
    route_long_name: Option<String>,
    route_desc: Option<String>,
}

fn parse_route_type<'de, D: Deserializer<'de>>(d: D) -> Result<RouteType, D::Error> {
    let n = <u16>::deserialize(d)?;
    RouteType::from_code(n)
        .ok_or_else(|| serde::de::Error::custom(format!("Unknown route_type {n}")))
}
