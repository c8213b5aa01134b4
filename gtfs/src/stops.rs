use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{orig, IDMapping, LonLat, StopID};

#[derive(Clone, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopID,
    pub orig_id: orig::StopID,
    pub pos: LonLat,
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Strictly loads a GTFS stops.txt. Any bad row fails the whole feed.
pub fn load<R: std::io::Read>(
    reader: R,
) -> Result<(BTreeMap<StopID, Stop>, IDMapping<orig::StopID, StopID>)> {
    let mut stops = BTreeMap::new();
    let mut ids = IDMapping::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        let pos = LonLat::new(rec.stop_lon, rec.stop_lat);
        if let Err(problem) = check_range("stop_lon", pos.x(), 180.0)
            .and_then(|_| check_range("stop_lat", pos.y(), 90.0))
        {
            bail!("{:?}: {problem}", rec.stop_id);
        }
        let id = ids.insert_new(rec.stop_id.clone())?;
        stops.insert(
            id,
            Stop {
                id,
                orig_id: rec.stop_id,
                pos,
                code: rec.stop_code,
                name: rec.stop_name,
                description: rec.stop_desc,
            },
        );
    }
    Ok((stops, ids))
}

#[derive(Deserialize)]
struct Record {
    stop_id: orig::StopID,
    stop_code: Option<String>,
    stop_name: Option<String>,
    stop_desc: Option<String>,
    stop_lon: f64,
    stop_lat: f64,
    // TODO Assuming location_type = 0 or empty. Stations and entrances come through as stops.
}

/// One usable row of a bare stop file.
#[derive(Clone, Debug, PartialEq)]
pub struct StopRecord {
    pub stop_id: Option<String>,
    pub pos: LonLat,
}

/// What the lenient parser found in a stop file. Rows that couldn't be turned into a
/// coordinate are reported, not fatal.
#[derive(Debug, Default)]
pub struct ParsedStops {
    /// In file order
    pub stops: Vec<StopRecord>,
    pub malformed: Vec<MalformedRow>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MalformedRow {
    /// 1-based, not counting the header
    pub row: usize,
    pub problem: MalformedStop,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MalformedStop {
    Unparseable(String),
    MissingField(&'static str),
    NotANumber { field: &'static str, value: String },
    OutOfRange { field: &'static str, value: f64 },
}

impl fmt::Display for MalformedStop {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MalformedStop::Unparseable(err) => write!(f, "unparseable row: {err}"),
            MalformedStop::MissingField(field) => write!(f, "{field} is empty"),
            MalformedStop::NotANumber { field, value } => {
                write!(f, "{field} = {value:?} isn't a number")
            }
            MalformedStop::OutOfRange { field, value } => {
                write!(f, "{field} = {value} is out of range")
            }
        }
    }
}

impl std::error::Error for MalformedStop {}

/// The stop file's header lacks a coordinate column, so no row can be used.
#[derive(Debug, PartialEq)]
pub struct MissingColumn(pub &'static str);

impl fmt::Display for MissingColumn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "no {} column in the header", self.0)
    }
}

impl std::error::Error for MissingColumn {}

/// Parses any CSV with `stop_lon` and `stop_lat` columns: a GTFS stops.txt, or a file of
/// merged stops. Only the coordinates (and `stop_id`, if present) are kept.
pub fn parse_stop_file<R: std::io::Read>(reader: R) -> Result<ParsedStops> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    for column in ["stop_lon", "stop_lat"] {
        if !headers.iter().any(|h| h == column) {
            return Err(MissingColumn(column).into());
        }
    }

    let mut parsed = ParsedStops::default();
    for (idx, rec) in reader.records().enumerate() {
        let row = idx + 1;
        let result = rec
            .map_err(|err| MalformedStop::Unparseable(err.to_string()))
            .and_then(|rec| {
                rec.deserialize::<RawRecord>(Some(&headers))
                    .map_err(|err| MalformedStop::Unparseable(err.to_string()))
            })
            .and_then(|raw| {
                let lon = parse_coord("stop_lon", raw.stop_lon.as_deref(), 180.0)?;
                let lat = parse_coord("stop_lat", raw.stop_lat.as_deref(), 90.0)?;
                Ok(StopRecord {
                    stop_id: raw.stop_id.filter(|x| !x.is_empty()),
                    pos: LonLat::new(lon, lat),
                })
            });
        match result {
            Ok(stop) => parsed.stops.push(stop),
            Err(problem) => parsed.malformed.push(MalformedRow { row, problem }),
        }
    }
    Ok(parsed)
}

#[derive(Deserialize)]
struct RawRecord {
    stop_id: Option<String>,
    stop_lon: Option<String>,
    stop_lat: Option<String>,
}

fn parse_coord(
    field: &'static str,
    value: Option<&str>,
    limit: f64,
) -> Result<f64, MalformedStop> {
    let value = match value {
        Some(x) if !x.is_empty() => x,
        _ => return Err(MalformedStop::MissingField(field)),
    };
    let parsed: f64 = value.parse().map_err(|_| MalformedStop::NotANumber {
        field,
        value: value.to_string(),
    })?;
    check_range(field, parsed, limit)?;
    Ok(parsed)
}

fn check_range(field: &'static str, value: f64, limit: f64) -> Result<(), MalformedStop> {
    // NaN fails this too
    if !(value.abs() <= limit) {
        return Err(MalformedStop::OutOfRange { field, value });
    }
    Ok(())
}
