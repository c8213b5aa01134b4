#[macro_use]
extern crate log;

use std::path::Path;

use abstutil::Timer;
use anyhow::Result;
use chrono::NaiveDate;
use structopt::StructOpt;

use gtfs::GTFS;
use walkshed::{DirSource, MajorStopConfig, MapConfig};

#[derive(StructOpt)]
#[structopt(name = "walkshed", about = "Walking distance buffers around transit stops")]
enum Command {
    /// Buffer every agency's stops and write the map as a static site
    Render {
        /// A JSON file overriding parts of the default map configuration
        #[structopt(long)]
        config: Option<String>,
        /// The agencies' stop file paths are relative to this directory
        #[structopt(long, default_value = ".")]
        stops_dir: String,
        /// Where to write index.html, map.json, and layers/
        #[structopt(long, default_value = "site")]
        out: String,
        /// Fail if any agency's layer can't be built, instead of leaving it out
        #[structopt(long)]
        strict: bool,
        /// Keep one polygon per stop, instead of merging overlapping buffers
        #[structopt(long)]
        no_dissolve: bool,
    },
    /// Find major transit stops in a GTFS feed and write them as a stop file
    MajorStops {
        /// A directory with unpacked GTFS, or a .zip
        gtfs: String,
        /// The path to write the major transit stops
        #[structopt(short, long)]
        output: String,
        /// A JSON file overriding the peak hours, headway, or duplicated routes
        #[structopt(long)]
        config: Option<String>,
        /// Judge services by the real calendar of the week containing this date, like
        /// 2017-07-03
        #[structopt(long)]
        week_of: Option<NaiveDate>,
    },
}

impl Command {
    fn run(self, timer: &mut Timer) -> Result<()> {
        match self {
            Command::Render {
                config,
                stops_dir,
                out,
                strict,
                no_dissolve,
            } => {
                let mut config = match config {
                    Some(path) => MapConfig::load(path)?,
                    None => MapConfig::default(),
                };
                config.strict |= strict;
                if no_dissolve {
                    config.dissolve = false;
                }

                let map = walkshed::build_map(&config, &DirSource::new(stops_dir), timer)?;
                for failure in &map.failures {
                    warn!("No layer for {}: {}", failure.agency, failure.error);
                }
                walkshed::write_site(&map, out, timer)
            }
            Command::MajorStops {
                gtfs,
                output,
                config,
                week_of,
            } => {
                let mut config = match config {
                    Some(path) => MajorStopConfig::load(path)?,
                    None => MajorStopConfig::default(),
                };
                if week_of.is_some() {
                    config.week_of = week_of;
                }

                timer.start("load GTFS");
                let feed = GTFS::load_from_path(&gtfs)?;
                timer.stop("load GTFS");

                timer.start("find major transit stops");
                let stops = walkshed::major::major_transit_stops(&feed, &config);
                timer.stop("find major transit stops");

                if let Some(parent) = Path::new(&output).parent() {
                    if !parent.as_os_str().is_empty() {
                        fs_err::create_dir_all(parent)?;
                    }
                }
                walkshed::major::write_merged_stops(&stops, fs_err::File::create(&output)?)?;
                info!("Wrote {} major transit stops to {output}", stops.len());
                Ok(())
            }
        }
    }
}

fn main() -> Result<()> {
    abstutil::logger::setup();

    let cmd = Command::from_iter(abstutil::cli_args());
    let mut timer = Timer::new("walkshed");
    cmd.run(&mut timer)
}
