use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{orig, IDMapping, StopID, Time, TripID};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StopTime {
    /// Only timepoints are required to have times
    pub arrival_time: Option<Time>,
    pub departure_time: Option<Time>,
    pub stop_id: StopID,
}

pub fn load<R: std::io::Read>(
    reader: R,
    stop_ids: &IDMapping<orig::StopID, StopID>,
    trip_ids: &IDMapping<orig::TripID, TripID>,
) -> Result<BTreeMap<TripID, Vec<StopTime>>> {
    let mut stop_times = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        let arrival_time = parse_optional_time(rec.arrival_time.as_deref())?;
        let departure_time = parse_optional_time(rec.departure_time.as_deref())?;
        if let (Some(arrival), Some(departure)) = (arrival_time, departure_time) {
            if arrival > departure {
                bail!("Arrival time {arrival} is > departure time {departure}");
            }
        }
        stop_times
            .entry(trip_ids.lookup(&rec.trip_id)?)
            .or_insert_with(Vec::new)
            .push((
                rec.stop_sequence,
                StopTime {
                    arrival_time,
                    departure_time,
                    stop_id: stop_ids.lookup(&rec.stop_id)?,
                },
            ));
    }

    // Sort by stop_sequence, in case the file isn't in order
    let mut results = BTreeMap::new();
    for (trip_id, mut stops) in stop_times {
        stops.sort_by_key(|(seq, _)| *seq);
        results.insert(
            trip_id,
            stops.into_iter().map(|(_, stop_time)| stop_time).collect(),
        );
    }
    Ok(results)
}

fn parse_optional_time(raw: Option<&str>) -> Result<Option<Time>> {
    match raw.map(|x| x.trim()) {
        None | Some("") => Ok(None),
        Some(x) => Time::parse(x).map(Some),
    }
}

#[derive(Deserialize)]
struct Record {
    trip_id: orig::TripID,
    arrival_time: Option<String>,
    departure_time: Option<String>,
    stop_id: orig::StopID,
    stop_sequence: usize,
}
