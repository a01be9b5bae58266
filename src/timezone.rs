use crate::error::UnmappedTimezoneWarning;
use jiff::tz::TimeZone;
use std::collections::{HashMap, HashSet};
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, warn};

pub const FALLBACK_ZONE: &str = "UTC";

const COUNTRY_ZONES: &[(&str, &str)] = &[
    ("PL", "Europe/Warsaw"),
    ("US", "America/New_York"),
    ("GB", "Europe/London"),
    ("DE", "Europe/Berlin"),
    ("FR", "Europe/Paris"),
    ("ES", "Europe/Madrid"),
    ("IT", "Europe/Rome"),
    ("NL", "Europe/Amsterdam"),
    ("SE", "Europe/Stockholm"),
    ("NO", "Europe/Oslo"),
    ("DK", "Europe/Copenhagen"),
    ("FI", "Europe/Helsinki"),
    ("JP", "Asia/Tokyo"),
    ("AU", "Australia/Sydney"),
    ("BR", "America/Sao_Paulo"),
    ("CA", "America/Toronto"),
    ("CH", "Europe/Zurich"),
    ("AT", "Europe/Vienna"),
    ("BE", "Europe/Brussels"),
    ("CZ", "Europe/Prague"),
    ("PT", "Europe/Lisbon"),
    ("GR", "Europe/Athens"),
    ("IE", "Europe/Dublin"),
    ("NZ", "Pacific/Auckland"),
    ("IN", "Asia/Kolkata"),
    ("CN", "Asia/Shanghai"),
    ("KR", "Asia/Seoul"),
    ("MX", "America/Mexico_City"),
    ("AR", "America/Argentina/Buenos_Aires"),
    ("ZA", "Africa/Johannesburg"),
    ("RU", "Europe/Moscow"),
    ("TR", "Europe/Istanbul"),
    ("SG", "Asia/Singapore"),
    ("HK", "Asia/Hong_Kong"),
    ("TH", "Asia/Bangkok"),
    ("MY", "Asia/Kuala_Lumpur"),
    ("ID", "Asia/Jakarta"),
    ("PH", "Asia/Manila"),
    ("VN", "Asia/Ho_Chi_Minh"),
];

pub fn zone_for_country(country: &str) -> Option<&'static str> {
    COUNTRY_ZONES
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(country.trim()))
        .map(|(_, zone)| *zone)
}

/// Resolves country codes to zones, remembering lookups and the countries
/// that had to fall back to UTC.
#[derive(Debug, Default)]
pub struct ZoneResolver {
    overrides: HashMap<String, String>,
    zones: HashMap<String, Option<TimeZone>>,
    unmapped: HashSet<String>,
}

impl ZoneResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        Self {
            overrides: overrides
                .iter()
                .map(|(code, zone)| (code.trim().to_ascii_uppercase(), zone.clone()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn zone_name(&self, country: &str) -> Option<String> {
        let code = country.trim().to_ascii_uppercase();
        self.overrides
            .get(&code)
            .cloned()
            .or_else(|| zone_for_country(&code).map(str::to_string))
    }

    /// Shifts a UTC instant to the listener's wall clock. DST is resolved
    /// for the instant itself. Instants the zone database cannot place, or
    /// whose wall clock would leave the supported year range, stay in UTC.
    pub fn to_local(&mut self, instant: OffsetDateTime, country: &str) -> OffsetDateTime {
        let code = country.trim().to_ascii_uppercase();
        if !self.zones.contains_key(&code) {
            let zone = self.lookup(&code);
            self.zones.insert(code.clone(), zone);
        }
        let Some(Some(zone)) = self.zones.get(&code) else {
            return instant.to_offset(UtcOffset::UTC);
        };
        local_offset(zone, instant)
            .and_then(|offset| instant.checked_to_offset(offset))
            .unwrap_or_else(|| instant.to_offset(UtcOffset::UTC))
    }

    pub fn warnings(&self) -> Vec<UnmappedTimezoneWarning> {
        let mut countries: Vec<&String> = self.unmapped.iter().collect();
        countries.sort();
        countries
            .into_iter()
            .map(|country| UnmappedTimezoneWarning {
                country: country.clone(),
            })
            .collect()
    }

    fn lookup(&mut self, code: &str) -> Option<TimeZone> {
        let Some(name) = self.zone_name(code) else {
            debug!(country = code, "country has no zone mapping, using {FALLBACK_ZONE}");
            self.unmapped.insert(code.to_string());
            return None;
        };
        match TimeZone::get(&name) {
            Ok(zone) => Some(zone),
            Err(err) => {
                warn!(country = code, zone = %name, %err, "unknown zone, using {FALLBACK_ZONE}");
                self.unmapped.insert(code.to_string());
                None
            }
        }
    }
}

fn local_offset(zone: &TimeZone, instant: OffsetDateTime) -> Option<UtcOffset> {
    let timestamp = jiff::Timestamp::from_second(instant.unix_timestamp()).ok()?;
    let seconds = timestamp.to_zoned(zone.clone()).offset().seconds();
    UtcOffset::from_whole_seconds(seconds).ok()
}
