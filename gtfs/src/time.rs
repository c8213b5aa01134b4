use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Time since the start of the service day. GTFS allows hours past 24 for trips that run
/// past midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(u32);

impl Time {
    /// None if the time doesn't fit
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Option<Self> {
        hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)
            .map(Self)
    }

    /// Parses HH:MM:SS or H:MM:SS
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim().split(':').collect();
        if parts.len() != 3 {
            bail!("Time {raw:?} isn't HH:MM:SS");
        }
        let hours: u32 = parts[0]
            .parse()
            .map_err(|_| anyhow!("Bad hours in {raw:?}"))?;
        let minutes: u32 = parts[1]
            .parse()
            .map_err(|_| anyhow!("Bad minutes in {raw:?}"))?;
        let seconds: u32 = parts[2]
            .parse()
            .map_err(|_| anyhow!("Bad seconds in {raw:?}"))?;
        if minutes >= 60 || seconds >= 60 {
            bail!("Time {raw:?} has out-of-range minutes or seconds");
        }
        Self::new(hours, minutes, seconds).ok_or_else(|| anyhow!("Time {raw:?} is too large"))
    }

    pub fn hour(self) -> u32 {
        self.0 / 3600
    }

    /// Seconds elapsed since the top of this time's hour
    pub fn seconds_into_hour(self) -> u32 {
        self.0 % 3600
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hour(),
            self.seconds_into_hour() / 60,
            self.0 % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_times() {
        let t = Time::parse("08:05:30").unwrap();
        assert_eq!(t.hour(), 8);
        assert_eq!(t.seconds_into_hour(), 5 * 60 + 30);
        assert_eq!(t.to_string(), "08:05:30");

        assert_eq!(Time::parse("8:05:30").unwrap(), t);
        assert_eq!(Time::parse("25:00:00").unwrap().hour(), 25);

        assert!(Time::parse("").is_err());
        assert!(Time::parse("08:61:00").is_err());
        assert!(Time::parse("noon").is_err());
    }

    #[test]
    fn huge_hours() {
        assert!(Time::parse("9999999:00:00").is_err());
        assert!(Time::parse("1193046:28:15").is_ok());
        assert!(Time::parse("1193046:28:16").is_err());
        assert_eq!(Time::new(u32::MAX, 0, 0), None);
    }
}
