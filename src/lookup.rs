use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::warn;

use crate::activity::parse_activity;
use crate::models::{Booking, BookingInput};

/// Fallback written for ids with no entry in their lookup table.
pub const UNRESOLVED: &str = "Unknown";

/// Lookup tables that can be imported alongside the booking export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    TourOperators,
    Hotels,
    Countries,
}

impl LookupKind {
    pub const ALL: [LookupKind; 3] = [
        LookupKind::TourOperators,
        LookupKind::Hotels,
        LookupKind::Countries,
    ];

    /// Path segment used by the import endpoint.
    pub fn slug(self) -> &'static str {
        match self {
            LookupKind::TourOperators => "tour-operators",
            LookupKind::Hotels => "hotels",
            LookupKind::Countries => "countries",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }

    pub fn table_name(self) -> &'static str {
        match self {
            LookupKind::TourOperators => "tour_operators",
            LookupKind::Hotels => "hotels",
            LookupKind::Countries => "countries",
        }
    }
}

/// id -> display name
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    names: HashMap<String, String>,
}

impl LookupTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            names: entries
                .into_iter()
                .map(|(k, v)| (k.into().trim().to_string(), v.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Map a raw column value to its name. An empty table passes values
    /// through, since some exports already carry names instead of ids.
    pub fn resolve(&self, raw: Option<&str>) -> String {
        let raw = raw.map(str::trim).filter(|v| !v.is_empty());
        match raw {
            None => UNRESOLVED.to_string(),
            Some(value) if self.is_empty() => value.to_string(),
            Some(value) => self
                .names
                .get(value)
                .cloned()
                .unwrap_or_else(|| UNRESOLVED.to_string()),
        }
    }
}

/// Replaces coded columns of a booking with readable names.
#[derive(Debug, Clone, Default)]
pub struct LookupResolver {
    tables: HashMap<LookupKind, LookupTable>,
}

impl LookupResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, kind: LookupKind, table: LookupTable) -> Self {
        self.tables.insert(kind, table);
        self
    }

    fn resolve(&self, kind: LookupKind, raw: Option<&str>) -> String {
        match self.tables.get(&kind) {
            Some(table) => table.resolve(raw),
            None => LookupTable::default().resolve(raw),
        }
    }

    /// Resolve names, read the arrival date and parse the activity code.
    pub fn enrich(&self, id: Option<i64>, input: &BookingInput) -> Booking {
        let arrival = input.arrival.as_deref().and_then(parse_arrival);
        if arrival.is_none() {
            if let Some(raw) = input.arrival.as_deref() {
                warn!(booking = ?id, arrival = raw, "unreadable arrival date");
            }
        }

        let activity = parse_activity(input.booked_activity.as_deref());

        Booking {
            id,
            name: input.name.clone(),
            family_name: input.family_name.clone(),
            arrival,
            booked_activity: input.booked_activity.clone(),
            tour_operator: self.resolve(LookupKind::TourOperators, input.tour_operator.as_deref()),
            hotel: self.resolve(LookupKind::Hotels, input.hotel.as_deref()),
            country: self.resolve(LookupKind::Countries, input.country.as_deref()),
            divers: activity.divers,
            diving_days: activity.diving_days,
            activity_type: activity.classification,
        }
    }
}

// Two-digit years go first: %Y would also accept "23" as year 23.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Read an arrival value; time components are dropped.
/// Accepts ISO dates and the `MM/DD/YY HH:MM:SS` form written by the
/// desktop database export.
pub fn parse_arrival(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operators() -> LookupTable {
        LookupTable::new([("1", "Sun Travel"), ("2", "Reef Tours")])
    }

    #[test]
    fn test_resolve_known_and_unknown_ids() {
        let table = operators();
        assert_eq!(table.resolve(Some("2")), "Reef Tours");
        assert_eq!(table.resolve(Some(" 1 ")), "Sun Travel");
        assert_eq!(table.resolve(Some("9")), "Unknown");
        assert_eq!(table.resolve(None), "Unknown");
        assert_eq!(table.resolve(Some("")), "Unknown");
    }

    #[test]
    fn test_empty_table_passes_names_through() {
        let table = LookupTable::default();
        assert_eq!(table.resolve(Some("Sun Travel")), "Sun Travel");
        assert_eq!(table.resolve(None), "Unknown");
    }

    #[test]
    fn test_parse_arrival_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 2, 27);
        assert_eq!(parse_arrival("2023-02-27"), expected);
        assert_eq!(parse_arrival("2023-02-27 00:00:00"), expected);
        assert_eq!(parse_arrival("2023-02-27T14:30:00"), expected);
        assert_eq!(parse_arrival("27/02/2023"), None);
        assert_eq!(parse_arrival("02/27/23"), expected);
        assert_eq!(parse_arrival("2023-02-30"), None);
        assert_eq!(parse_arrival(""), None);
    }

    #[test]
    fn test_parse_arrival_desktop_export_format() {
        let expected = NaiveDate::from_ymd_opt(2023, 2, 27);
        assert_eq!(parse_arrival("02/27/23 00:00:00"), expected);
        assert_eq!(parse_arrival("02/27/2023 00:00:00"), expected);
        assert_eq!(parse_arrival(" 12/01/99 08:15:00 "), NaiveDate::from_ymd_opt(1999, 12, 1));
        assert_eq!(parse_arrival("13/27/23 00:00:00"), None);
    }

    #[test]
    fn test_exported_row_reaches_schedule() {
        let csv = "Name,Family Name,Arrival,Tour Operator,Booked Activity\nAna,Diaz,02/27/23 00:00:00,Sun,5DD\n";
        let rows = crate::import::read_bookings(csv.as_bytes()).unwrap();
        let bookings: Vec<Booking> = rows
            .iter()
            .map(|row| LookupResolver::new().enrich(None, row))
            .collect();

        assert_eq!(bookings[0].arrival, NaiveDate::from_ymd_opt(2023, 2, 27));
        let schedule = crate::projections::build_monthly_schedule(&bookings, 2023, 2).unwrap();
        assert_eq!(schedule.guests.len(), 1);
        assert_eq!(schedule.daily_totals[26..], [1, 1]);
    }

    #[test]
    fn test_enrich_booking() {
        let resolver = LookupResolver::new()
            .with_table(LookupKind::TourOperators, operators())
            .with_table(LookupKind::Countries, LookupTable::new([("49", "Germany")]));

        let input = BookingInput {
            name: Some("Ana".to_string()),
            family_name: Some("Diaz".to_string()),
            arrival: Some("2023-02-10".to_string()),
            tour_operator: Some("1".to_string()),
            booked_activity: Some("OWC/AI 4DD".to_string()),
            hotel: Some("Coral Bay".to_string()),
            country: Some("33".to_string()),
        };
        let booking = resolver.enrich(Some(7), &input);

        assert_eq!(booking.id, Some(7));
        assert_eq!(booking.tour_operator, "Sun Travel");
        assert_eq!(booking.hotel, "Coral Bay");
        assert_eq!(booking.country, "Unknown");
        assert_eq!(booking.arrival, NaiveDate::from_ymd_opt(2023, 2, 10));
        assert_eq!(booking.divers, 2);
        assert_eq!(booking.diving_days, 7);
        assert_eq!(booking.activity_type, "OWC (+AI)");
    }

    #[test]
    fn test_enrich_tolerates_bad_dates() {
        let input = BookingInput {
            arrival: Some("soon".to_string()),
            ..Default::default()
        };
        let booking = LookupResolver::new().enrich(None, &input);
        assert_eq!(booking.arrival, None);
        assert_eq!(booking.activity_type, "Unknown");
        assert_eq!(booking.tour_operator, "Unknown");
    }

    #[test]
    fn test_lookup_kind_slugs() {
        for kind in LookupKind::ALL {
            assert_eq!(LookupKind::from_slug(kind.slug()), Some(kind));
        }
        assert_eq!(LookupKind::from_slug("guests"), None);
    }
}
