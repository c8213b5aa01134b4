use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agency {
    /// Optional when a feed only has one agency
    pub agency_id: Option<String>,
    pub name: String,
    pub url: Option<String>,
    pub timezone: Option<String>,
}

pub fn load<R: std::io::Read>(reader: R) -> Result<Vec<Agency>> {
    let mut agencies = Vec::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        agencies.push(Agency {
            agency_id: rec.agency_id,
            name: rec.agency_name,
            url: rec.agency_url,
            timezone: rec.agency_timezone,
        });
    }
    Ok(agencies)
}

#[derive(Deserialize)]
struct Record {
    agency_id: Option<String>,
    agency_name: String,
    agency_url: Option<String>,
    agency_timezone: Option<String>,
}
