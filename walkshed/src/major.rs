//! Finds "major transit stops" in a GTFS feed: rail stations, ferry terminals, and places
//! where at least two frequent bus routes with weekend service cross. Frequency is judged
//! from Monday service in the morning and evening peak hours. By default, services are judged
//! by their days of the week; `MajorStopConfig::week_of` checks real dates instead.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};
use gtfs::{orig, Route, RouteID, RouteType, Service, Stop, StopID, Time, TripID, GTFS};
use serde::{Deserialize, Serialize};

use crate::config::MajorStopConfig;

/// Route short names that an agency runs as one service, like a local and its rapid
/// variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DuplicatedRoutes {
    pub agency_id: String,
    pub groups: Vec<Vec<String>>,
}

impl DuplicatedRoutes {
    /// The rapid variants mostly serve a subset of the local's stops.
    pub fn sfmta() -> Self {
        Self {
            agency_id: "SFMTA".to_string(),
            groups: [["5", "5R"], ["9", "9R"], ["14", "14R"], ["28", "28R"], ["38", "38R"]]
                .into_iter()
                .map(|group| group.into_iter().map(|x| x.to_string()).collect::<Vec<_>>())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MergedRoute {
    pub route_type: RouteType,
    pub route_ids: BTreeSet<RouteID>,
    pub short_names: BTreeSet<String>,
}

/// Stops around the same intersection, like "24th St & Mission St" and
/// "Mission St & 24th St"
#[derive(Clone, Debug, PartialEq)]
pub struct MergedStop {
    pub members: Vec<StopID>,
    pub stop_ids: Vec<orig::StopID>,
    pub lat: f64,
    pub lon: f64,
    pub name: String,
}

/// Groups routes that the agency lists as duplicates. The merged route takes the type of its
/// first member. Output follows the order routes first appear.
pub fn merged_routes(
    agency_id: Option<&str>,
    routes: &[Route],
    duplicated: &[DuplicatedRoutes],
) -> Vec<MergedRoute> {
    let mut short_name_to_group: BTreeMap<&str, usize> = BTreeMap::new();
    if let Some(agency_id) = agency_id {
        let mut group_id = 0;
        for entry in duplicated.iter().filter(|d| d.agency_id == agency_id) {
            for group in &entry.groups {
                for short_name in group {
                    short_name_to_group.insert(short_name.as_str(), group_id);
                }
                group_id += 1;
            }
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum Key<'a> {
        Group(usize),
        Route(&'a RouteID),
    }

    let mut order: Vec<Key> = Vec::new();
    let mut grouped: BTreeMap<Key, Vec<&Route>> = BTreeMap::new();
    for route in routes {
        let key = match route
            .short_name
            .as_deref()
            .and_then(|name| short_name_to_group.get(name))
        {
            Some(group) => Key::Group(*group),
            None => Key::Route(&route.route_id),
        };
        let list = grouped.entry(key).or_insert_with(Vec::new);
        list.push(route);
        if list.len() == 1 {
            order.push(key);
        }
    }

    order
        .into_iter()
        .map(|key| {
            let group = &grouped[&key];
            MergedRoute {
                route_type: group[0].route_type,
                route_ids: group.iter().map(|r| r.route_id.clone()).collect(),
                short_names: group.iter().filter_map(|r| r.short_name.clone()).collect(),
            }
        })
        .collect()
}

/// Groups stops by the set of streets in their name. Stops without a name stay alone.
/// Output follows the order groups first appear.
pub fn merged_stops<'a, I: IntoIterator<Item = &'a Stop>>(stops: I) -> Vec<MergedStop> {
    let mut order: Vec<BTreeSet<String>> = Vec::new();
    let mut grouped: BTreeMap<BTreeSet<String>, Vec<&Stop>> = BTreeMap::new();
    for stop in stops {
        let key = cross_street_key(stop);
        let list = grouped.entry(key.clone()).or_insert_with(Vec::new);
        list.push(stop);
        if list.len() == 1 {
            order.push(key);
        }
    }

    order
        .into_iter()
        .map(|key| {
            let group = &grouped[&key];
            let n = group.len() as f64;
            MergedStop {
                members: group.iter().map(|s| s.id).collect(),
                stop_ids: group.iter().map(|s| s.orig_id.clone()).collect(),
                lat: group.iter().map(|s| s.pos.y()).sum::<f64>() / n,
                lon: group.iter().map(|s| s.pos.x()).sum::<f64>() / n,
                name: group[0].name.clone().unwrap_or_default(),
            }
        })
        .collect()
}

fn cross_street_key(stop: &Stop) -> BTreeSet<String> {
    match stop.name {
        Some(ref name) if !name.trim().is_empty() => {
            name.split('&').map(|x| x.trim().to_string()).collect()
        }
        // Unique per stop, and can't collide with a street name
        _ => std::iter::once(format!("\u{0}{}", stop.orig_id.as_str())).collect(),
    }
}

/// True when sorted consecutive times within one hour are never more than `max_gap_seconds`
/// apart. The edges of the hour aren't checked.
pub fn are_times_close(times: &[Time], max_gap_seconds: u32) -> bool {
    let mut times: Vec<u32> = times.iter().map(|t| t.seconds_into_hour()).collect();
    times.sort();
    times
        .windows(2)
        .all(|pair| pair[1] - pair[0] <= max_gap_seconds)
}

/// Walks a feed once and answers whether merged stops are major.
pub struct MajorStopFinder<'a> {
    gtfs: &'a GTFS,
    config: &'a MajorStopConfig,
    routes: Vec<MergedRoute>,
    route_to_merged: BTreeMap<&'a RouteID, usize>,
    visits: BTreeMap<StopID, Vec<(TripID, Option<Time>)>>,
    /// The Monday of `config.week_of`
    monday: Option<NaiveDate>,
}

impl<'a> MajorStopFinder<'a> {
    pub fn new(gtfs: &'a GTFS, config: &'a MajorStopConfig) -> Self {
        let agency_id = gtfs.agency().and_then(|a| a.agency_id.as_deref());
        let routes = merged_routes(agency_id, &gtfs.routes, &config.duplicated_routes);
        let mut route_to_merged = BTreeMap::new();
        for route in &gtfs.routes {
            if let Some(idx) = routes
                .iter()
                .position(|m| m.route_ids.contains(&route.route_id))
            {
                route_to_merged.insert(&route.route_id, idx);
            }
        }

        let mut visits: BTreeMap<StopID, Vec<(TripID, Option<Time>)>> = BTreeMap::new();
        for trip in gtfs.trips.values() {
            for st in &trip.stop_times {
                visits
                    .entry(st.stop_id)
                    .or_insert_with(Vec::new)
                    .push((trip.id, st.arrival_time));
            }
        }

        let monday = config
            .week_of
            .map(|date| date - Duration::days(date.weekday().num_days_from_monday() as i64));
        if let Some(monday) = monday {
            info!("Judging services by the week starting {monday}");
        }

        Self {
            gtfs,
            config,
            routes,
            route_to_merged,
            visits,
            monday,
        }
    }

    fn runs_monday(&self, service: &Service) -> bool {
        match self.monday {
            Some(monday) => service.runs_on_date(monday),
            None => service.days_of_week.monday,
        }
    }

    fn runs_on_weekend(&self, service: &Service) -> bool {
        match self.monday {
            Some(monday) => {
                service.runs_on_date(monday + Duration::days(5))
                    || service.runs_on_date(monday + Duration::days(6))
            }
            None => service.days_of_week.runs_on_weekend(),
        }
    }

    pub fn merged_routes(&self) -> &[MergedRoute] {
        &self.routes
    }

    pub fn is_major(&self, stop: &MergedStop) -> bool {
        let mut am_peak: BTreeMap<usize, BTreeSet<Time>> = BTreeMap::new();
        let mut pm_peak: BTreeMap<usize, BTreeSet<Time>> = BTreeMap::new();
        let mut weekend: BTreeSet<usize> = BTreeSet::new();

        for (trip_id, arrival) in stop
            .members
            .iter()
            .flat_map(|id| self.visits.get(id).into_iter().flatten())
        {
            let trip = &self.gtfs.trips[trip_id];
            let merged = match self.route_to_merged.get(&trip.route_id) {
                Some(x) => *x,
                None => {
                    warn!("{:?} uses unknown {:?}", trip.orig_id, trip.route_id);
                    continue;
                }
            };
            // Rail and ferries qualify on their own
            // TODO A ferry terminal should only count if bus or rail also serve it
            if !self.routes[merged].route_type.is_bus() {
                return true;
            }

            let service = match self.gtfs.calendar.services.get(&trip.service_id) {
                Some(x) => x,
                None => {
                    warn!("{:?} uses unknown {:?}", trip.orig_id, trip.service_id);
                    continue;
                }
            };
            if self.runs_on_weekend(service) {
                weekend.insert(merged);
            }
            if self.runs_monday(service) {
                if let Some(time) = arrival {
                    if time.hour() == self.config.am_peak_hour {
                        am_peak.entry(merged).or_default().insert(*time);
                    } else if time.hour() == self.config.pm_peak_hour {
                        pm_peak.entry(merged).or_default().insert(*time);
                    }
                }
            }
        }

        let frequent = |times: Option<&BTreeSet<Time>>| {
            let times: Vec<Time> = times.into_iter().flatten().cloned().collect();
            are_times_close(&times, self.config.max_headway_seconds)
        };
        let frequent_routes = am_peak
            .keys()
            .filter(|route| {
                weekend.contains(*route)
                    && frequent(am_peak.get(*route))
                    && frequent(pm_peak.get(*route))
            })
            .count();
        frequent_routes >= self.config.min_frequent_bus_routes
    }
}

/// Merged stops that qualify as major, in feed order
pub fn major_transit_stops(gtfs: &GTFS, config: &MajorStopConfig) -> Vec<MergedStop> {
    let finder = MajorStopFinder::new(gtfs, config);
    let merged = merged_stops(gtfs.stops.values());
    let total = merged.len();
    let major: Vec<MergedStop> = merged
        .into_iter()
        .filter(|stop| finder.is_major(stop))
        .collect();
    info!(
        "{} of {} merged stops ({} routes after merging) are major",
        major.len(),
        total,
        finder.merged_routes().len()
    );
    major
}

/// Writes a stop file that the map can read directly.
pub fn write_merged_stops<W: std::io::Write>(stops: &[MergedStop], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for stop in stops {
        writer.serialize(Record {
            stop_ids: stop
                .stop_ids
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>()
                .join(";"),
            stop_lat: stop.lat,
            stop_lon: stop.lon,
            stop_name: &stop.name,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct Record<'a> {
    stop_ids: String,
    stop_lat: f64,
    stop_lon: f64,
    stop_name: &'a str,
}

#[cfg(test)]
mod tests {
    use gtfs::{CheapID, FeedSource, LonLat};

    use super::*;

    fn t(hour: u32, minute: u32) -> Time {
        Time::new(hour, minute, 0).unwrap()
    }

    #[test]
    fn times_close() {
        let gap = 15 * 60;
        assert!(are_times_close(&[t(3, 0), t(3, 10), t(3, 20), t(3, 30)], gap));
        assert!(!are_times_close(&[t(3, 0), t(3, 20), t(3, 30), t(3, 40)], gap));
        assert!(!are_times_close(&[t(3, 0), t(3, 10), t(3, 20), t(3, 40)], gap));
        // Order doesn't matter
        assert!(are_times_close(&[t(3, 30), t(3, 0), t(3, 20), t(3, 10)], gap));
        assert!(are_times_close(&[], gap));
    }

    fn route(id: &str, short_name: &str) -> Route {
        Route {
            route_id: RouteID::new(id),
            route_type: RouteType::Bus,
            short_name: Some(short_name.to_string()),
            long_name: None,
            description: None,
        }
    }

    #[test]
    fn merge_rapid_routes() {
        let routes = vec![route("0", "5"), route("1", "5R"), route("2", "44")];
        let merged = merged_routes(Some("SFMTA"), &routes, &[DuplicatedRoutes::sfmta()]);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged[0].route_ids,
            vec![RouteID::new("0"), RouteID::new("1")]
                .into_iter()
                .collect::<BTreeSet<_>>()
        );
        assert_eq!(
            merged[0].short_names,
            vec!["5".to_string(), "5R".to_string()]
                .into_iter()
                .collect::<BTreeSet<_>>()
        );
        assert_eq!(merged[0].route_type, RouteType::Bus);
        assert_eq!(
            merged[1].route_ids,
            vec![RouteID::new("2")].into_iter().collect::<BTreeSet<_>>()
        );

        // Other agencies don't get SFMTA's groups
        let merged = merged_routes(Some("AC"), &routes, &[DuplicatedRoutes::sfmta()]);
        assert_eq!(merged.len(), 3);
    }

    fn stop(idx: usize, name: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            id: StopID::new(idx),
            orig_id: orig::StopID::new(idx.to_string()),
            pos: LonLat::new(lon, lat),
            code: None,
            name: Some(name.to_string()),
            description: None,
        }
    }

    #[test]
    fn merge_cross_streets() {
        let stops = vec![
            stop(0, "24th St & Mission St", -1.0, 5.0),
            stop(1, "Mission St & 24th St", 1.0, 3.0),
            stop(2, "Bryant St & 24th St", 7.0, 9.0),
        ];
        let merged = merged_stops(&stops);
        assert_eq!(merged.len(), 2);

        assert_eq!(
            merged[0].stop_ids,
            vec![orig::StopID::new("0"), orig::StopID::new("1")]
        );
        assert_eq!(merged[0].lat, 0.0);
        assert_eq!(merged[0].lon, 4.0);
        assert_eq!(merged[0].name, "24th St & Mission St");

        assert_eq!(merged[1].stop_ids, vec![orig::StopID::new("2")]);
        assert_eq!(merged[1].lat, 7.0);
        assert_eq!(merged[1].lon, 9.0);
    }

    /// Builds a small feed where every trip has one stop time.
    struct Feed {
        files: BTreeMap<&'static str, String>,
        trips: usize,
    }

    impl Feed {
        fn new() -> Self {
            let mut files = BTreeMap::new();
            files.insert(
                "agency.txt",
                "agency_id,agency_name,agency_url,agency_timezone\n\
                 SFMTA,San Francisco Municipal Transportation Agency,http://www.sfmta.com,America/Los_Angeles\n"
                    .to_string(),
            );
            files.insert(
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\n\
                 A,24th St & Mission St,37.7522,-122.4184\n\
                 B,Mission St & 24th St,37.7524,-122.4186\n\
                 C,Bryant St & 24th St,37.7528,-122.4091\n\
                 D,22nd St Caltrain,37.7574,-122.3925\n\
                 E,Valencia St & 24th St,37.7520,-122.4206\n"
                    .to_string(),
            );
            files.insert(
                "routes.txt",
                "route_id,route_short_name,route_type\n\
                 R5,5,3\n\
                 R5R,5R,3\n\
                 R14,14,3\n\
                 RCAL,,2\n"
                    .to_string(),
            );
            files.insert(
                "calendar.txt",
                "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
                 WKDY,1,1,1,1,1,0,0,20170101,20171231\n\
                 WKND,0,0,0,0,0,1,1,20170101,20171231\n"
                    .to_string(),
            );
            files.insert(
                "trips.txt",
                "route_id,service_id,trip_id\n".to_string(),
            );
            files.insert(
                "stop_times.txt",
                "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n".to_string(),
            );
            Self { files, trips: 0 }
        }

        fn trip(&mut self, route: &str, service: &str, stop: &str, time: &str) {
            self.trips += 1;
            let trip_id = format!("T{}", self.trips);
            self.files
                .get_mut("trips.txt")
                .unwrap()
                .push_str(&format!("{route},{service},{trip_id}\n"));
            self.files
                .get_mut("stop_times.txt")
                .unwrap()
                .push_str(&format!("{trip_id},{time},{time},{stop},1\n"));
        }

        /// Weekday service in both peaks, every `headway` minutes
        fn peak_service(&mut self, route: &str, stop: &str, headway: usize) {
            for hour in [8, 17] {
                for minute in (0..60).step_by(headway) {
                    self.trip(route, "WKDY", stop, &format!("{hour:02}:{minute:02}:00"));
                }
            }
        }

        fn load(mut self) -> GTFS {
            GTFS::load(&mut self).unwrap()
        }
    }

    impl FeedSource for Feed {
        fn read_file(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.files.get(name).map(|x| x.as_bytes().to_vec()))
        }
    }

    fn major_stop_ids(gtfs: &GTFS) -> Vec<Vec<String>> {
        major_stop_ids_with(gtfs, &MajorStopConfig::default())
    }

    fn major_stop_ids_with(gtfs: &GTFS, config: &MajorStopConfig) -> Vec<Vec<String>> {
        major_transit_stops(gtfs, config)
            .into_iter()
            .map(|s| s.stop_ids.iter().map(|id| id.as_str().to_string()).collect())
            .collect()
    }

    #[test]
    fn find_major_stops() {
        let mut feed = Feed::new();
        // Two frequent routes with weekend service meet at 24th & Mission. The 5 only has
        // weekend service through the 5R.
        feed.peak_service("R14", "A", 10);
        feed.peak_service("R5", "B", 10);
        feed.trip("R14", "WKND", "A", "12:00:00");
        feed.trip("R5R", "WKND", "B", "12:00:00");

        // Only one frequent route
        feed.peak_service("R14", "C", 10);
        feed.trip("R14", "WKND", "C", "12:00:00");

        // Rail always counts
        feed.trip("RCAL", "WKDY", "D", "07:00:00");

        // The 5 is too infrequent here
        feed.peak_service("R14", "E", 10);
        feed.peak_service("R5", "E", 20);
        feed.trip("R14", "WKND", "E", "12:00:00");
        feed.trip("R5R", "WKND", "E", "12:00:00");

        let gtfs = feed.load();
        assert_eq!(
            major_stop_ids(&gtfs),
            vec![
                vec!["A".to_string(), "B".to_string()],
                vec!["D".to_string()]
            ]
        );
    }

    #[test]
    fn judge_one_week() {
        let mut feed = Feed::new();
        feed.peak_service("R14", "A", 10);
        feed.peak_service("R5", "B", 10);
        feed.trip("R14", "WKND", "A", "12:00:00");
        feed.trip("R5R", "WKND", "B", "12:00:00");
        feed.trip("RCAL", "WKDY", "D", "07:00:00");
        // No weekend service on the 4th of July weekend
        feed.files.insert(
            "calendar_dates.txt",
            "service_id,date,exception_type\n\
             WKND,20170708,2\n\
             WKND,20170709,2\n"
                .to_string(),
        );
        let gtfs = feed.load();

        let everything = vec![
            vec!["A".to_string(), "B".to_string()],
            vec!["D".to_string()],
        ];
        assert_eq!(major_stop_ids(&gtfs), everything);

        let mut config = MajorStopConfig::default();
        config.week_of = NaiveDate::from_ymd_opt(2017, 6, 28);
        assert_eq!(major_stop_ids_with(&gtfs, &config), everything);

        // A Thursday picks the week starting July 3rd
        config.week_of = NaiveDate::from_ymd_opt(2017, 7, 6);
        assert_eq!(
            major_stop_ids_with(&gtfs, &config),
            vec![vec!["D".to_string()]]
        );

        // After the calendar ends, only rail counts
        config.week_of = NaiveDate::from_ymd_opt(2018, 3, 1);
        assert_eq!(
            major_stop_ids_with(&gtfs, &config),
            vec![vec!["D".to_string()]]
        );
    }

    #[test]
    fn weekend_service_is_required() {
        let mut feed = Feed::new();
        feed.peak_service("R14", "A", 10);
        feed.peak_service("R5", "A", 10);
        feed.trip("R14", "WKND", "A", "12:00:00");
        let gtfs = feed.load();
        assert!(major_stop_ids(&gtfs).is_empty());
    }

    #[test]
    fn output_is_a_stop_file() {
        let stops = vec![
            stop(0, "24th St & Mission St", 37.7522, -122.4184),
            stop(1, "Mission St & 24th St", 37.7524, -122.4186),
        ];
        let merged = merged_stops(&stops);
        let mut out = Vec::new();
        write_merged_stops(&merged, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("stop_ids,stop_lat,stop_lon,stop_name\n0;1,"));

        let parsed = gtfs::parse_stop_file(text.as_bytes()).unwrap();
        assert_eq!(parsed.stops.len(), 1);
        assert!((parsed.stops[0].pos.y() - 37.7523).abs() < 1e-9);
        assert!((parsed.stops[0].pos.x() - -122.4185).abs() < 1e-9);
    }
}
