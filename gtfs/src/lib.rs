#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod agency;
mod calendar;
mod ids;
mod lonlat;
mod routes;
mod stop_times;
mod stops;
mod time;
mod trips;

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use zip::result::ZipError;
use zip::ZipArchive;

pub use agency::Agency;
pub use calendar::{Calendar, DaysOfWeek, Service, ServiceID};
pub use ids::{orig, CheapID, IDMapping, StopID, TripID};
pub use lonlat::LonLat;
pub use routes::{Route, RouteID, RouteType};
pub use stop_times::StopTime;
pub use stops::{
    parse_stop_file, MalformedRow, MalformedStop, MissingColumn, ParsedStops, Stop, StopRecord,
};
pub use time::Time;
pub use trips::Trip;

#[derive(Clone, Serialize, Deserialize)]
pub struct GTFS {
    pub agencies: Vec<Agency>,
    pub stops: BTreeMap<StopID, Stop>,
    /// In file order
    pub routes: Vec<Route>,
    pub trips: BTreeMap<TripID, Trip>,
    pub calendar: Calendar,
}

impl GTFS {
    /// A directory of unpacked .txt files, or a .zip with them at the root or under `gtfs/`
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::load(&mut DirFeed::new(path))
        } else {
            let file = fs_err::File::open(path)?;
            let mut feed = ZipFeed::new(file).with_context(|| format!("{}", path.display()))?;
            Self::load(&mut feed)
        }
    }

    pub fn load(source: &mut dyn FeedSource) -> Result<Self> {
        let agencies = agency::load(require(source, "agency.txt")?)?;
        let (stops, stop_ids) = stops::load(require(source, "stops.txt")?)
            .context("stops.txt")?;
        let routes = routes::load(require(source, "routes.txt")?).context("routes.txt")?;
        let (trips, trip_ids) = trips::load(require(source, "trips.txt")?).context("trips.txt")?;
        let mut stop_times = stop_times::load(
            require(source, "stop_times.txt")?,
            &stop_ids,
            &trip_ids,
        )
        .context("stop_times.txt")?;

        let mut calendar = match source.read_file("calendar.txt")? {
            Some(bytes) => calendar::load(Cursor::new(bytes)).context("calendar.txt")?,
            None => {
                warn!("No calendar.txt; services only defined by calendar_dates.txt are ignored");
                Calendar::default()
            }
        };
        if let Some(bytes) = source.read_file("calendar_dates.txt")? {
            calendar::load_exceptions(&mut calendar, Cursor::new(bytes))
                .context("calendar_dates.txt")?;
        }

        let mut trips_by_id = BTreeMap::new();
        for mut trip in trips {
            match stop_times.remove(&trip.id) {
                Some(list) => {
                    trip.stop_times = list;
                }
                None => {
                    warn!("Trip {:?} has no stop times", trip.orig_id);
                }
            }
            trips_by_id.insert(trip.id, trip);
        }

        info!(
            "Loaded GTFS with {} agencies, {} stops, {} routes, {} trips, {} services",
            agencies.len(),
            stops.len(),
            routes.len(),
            trips_by_id.len(),
            calendar.services.len()
        );

        Ok(Self {
            agencies,
            stops,
            routes,
            trips: trips_by_id,
            calendar,
        })
    }

    /// The feed's first agency. GTFS requires at least one.
    pub fn agency(&self) -> Option<&Agency> {
        self.agencies.first()
    }
}

/// Somewhere to read a GTFS feed's files from.
pub trait FeedSource {
    /// None if the file doesn't exist
    fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>>;
}

fn require(source: &mut dyn FeedSource, name: &str) -> Result<Cursor<Vec<u8>>> {
    match source.read_file(name)? {
        Some(bytes) => Ok(Cursor::new(bytes)),
        None => bail!("GTFS feed is missing {name}"),
    }
}

pub struct DirFeed {
    dir: PathBuf,
}

impl DirFeed {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl FeedSource for DirFeed {
    fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs_err::read(path)?))
    }
}

pub struct ZipFeed<R: Read + Seek> {
    archive: ZipArchive<R>,
}

impl<R: Read + Seek> ZipFeed<R> {
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(reader)?,
        })
    }
}

impl<R: Read + Seek> FeedSource for ZipFeed<R> {
    fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        for path in [name.to_string(), format!("gtfs/{name}")] {
            match self.archive.by_name(&path) {
                Ok(mut file) => {
                    let mut bytes = Vec::new();
                    file.read_to_end(&mut bytes)
                        .map_err(|err| anyhow!("{path}: {err}"))?;
                    return Ok(Some(bytes));
                }
                Err(ZipError::FileNotFound) => {}
                // Adds the path in the error message
                Err(err) => bail!("{path}: {err}"),
            }
        }
        Ok(None)
    }
}
