use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Consumer route groups an event can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Queries,
    Storage,
    #[serde(rename = "usagemonitoring")]
    UsageMonitoring,
    Videos,
}

impl Destination {
    pub const ALL: [Destination; 4] = [
        Destination::Queries,
        Destination::Storage,
        Destination::UsageMonitoring,
        Destination::Videos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Queries => "queries",
            Destination::Storage => "storage",
            Destination::UsageMonitoring => "usagemonitoring",
            Destination::Videos => "videos",
        }
    }

    /// Fixed path of the consumer endpoint, appended to the destination's base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Destination::Queries => "/queries/events",
            Destination::Storage => "/storage/events",
            Destination::UsageMonitoring => "/usagemonitoring/events",
            Destination::Videos => "/videos/events",
        }
    }

    /// Destinations that track quota for a gallery change.
    pub fn quota_trackers() -> [Destination; 3] {
        [
            Destination::Storage,
            Destination::UsageMonitoring,
            Destination::Queries,
        ]
    }

    /// Destinations that cache counters published by the quota trackers.
    pub fn counter_caches() -> [Destination; 2] {
        [Destination::Videos, Destination::Queries]
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Destination::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown destination: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_match_consumer_routes() {
        assert_eq!(Destination::Queries.path(), "/queries/events");
        assert_eq!(Destination::Storage.path(), "/storage/events");
        assert_eq!(Destination::UsageMonitoring.path(), "/usagemonitoring/events");
        assert_eq!(Destination::Videos.path(), "/videos/events");
    }

    #[test]
    fn parses_its_own_names() {
        for destination in Destination::ALL {
            assert_eq!(destination.as_str().parse::<Destination>().unwrap(), destination);
        }
        assert!("billing".parse::<Destination>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Destination::UsageMonitoring).unwrap();
        assert_eq!(json, "\"usagemonitoring\"");
    }
}
