use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{orig, IDMapping, RouteID, ServiceID, StopTime, TripID};

#[derive(Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripID,
    pub orig_id: orig::TripID,
    pub route_id: RouteID,
    pub service_id: ServiceID,
    /// Sorted by stop_sequence
    pub stop_times: Vec<StopTime>,
}

pub fn load<R: std::io::Read>(reader: R) -> Result<(Vec<Trip>, IDMapping<orig::TripID, TripID>)> {
    let mut trips = Vec::new();
    let mut ids = IDMapping::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        let id = ids.insert_new(rec.trip_id.clone())?;
        trips.push(Trip {
            id,
            orig_id: rec.trip_id,
            route_id: rec.route_id,
            service_id: rec.service_id,
            stop_times: Vec::new(),
        });
    }
    Ok((trips, ids))
}

#[derive(Deserialize)]
struct Record {
    trip_id: orig::TripID,
    route_id: RouteID,
    service_id: ServiceID,
}
