use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw booking row, as it arrives from the JSON API or a CSV export.
/// Id-valued columns still hold codes until resolved.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct BookingInput {
    #[serde(rename = "Name", alias = "name", default)]
    pub name: Option<String>,
    #[serde(rename = "Family Name", alias = "family_name", default)]
    pub family_name: Option<String>,
    #[serde(rename = "Arrival", alias = "arrival", default)]
    pub arrival: Option<String>,
    #[serde(rename = "Tour Operator", alias = "tour_operator", default)]
    pub tour_operator: Option<String>,
    #[serde(rename = "Booked Activity", alias = "booked_activity", default)]
    pub booked_activity: Option<String>,
    #[serde(rename = "Hotel", alias = "hotel", default)]
    pub hotel: Option<String>,
    #[serde(rename = "Country", alias = "country", default)]
    pub country: Option<String>,
}

/// Booking after lookup resolution and activity parsing.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Booking {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub family_name: Option<String>,
    /// `None` when the source value was missing or unreadable
    pub arrival: Option<NaiveDate>,
    pub booked_activity: Option<String>,
    pub tour_operator: String,
    pub hotel: String,
    pub country: String,
    pub divers: u32,
    pub diving_days: u32,
    pub activity_type: String,
}

impl Booking {
    /// Display key for the guest: given name, a space, family name.
    pub fn guest_key(&self) -> String {
        format!(
            "{} {}",
            self.name.as_deref().unwrap_or(""),
            self.family_name.as_deref().unwrap_or("")
        )
    }
}

/// Result of parsing one activity code
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ParsedActivity {
    pub divers: u32,
    pub diving_days: u32,
    pub classification: String,
}

/// One guest line of the monthly schedule.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GuestRow {
    pub guest: String,
    pub tour_operator: String,
    pub activity: String,
    /// Classification when it is a certification course, otherwise empty
    pub course: String,
    pub diving_days: u32,
    pub first_arrival: NaiveDate,
    /// 0/1 presence, one entry per day of the month
    pub days: Vec<u8>,
}

/// Name/count pair used by the operator and course summaries.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub name: String,
    pub guests: usize,
}

/// Day-by-day attendance matrix for one calendar month.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MonthlySchedule {
    pub year: i32,
    pub month: u32,
    /// "MM-DD" labels, one per day of the month
    pub day_labels: Vec<String>,
    pub guests: Vec<GuestRow>,
    /// Column-wise sum of the day cells over all guests
    pub daily_totals: Vec<u32>,
    /// Reserved for external enrichment; always zero here
    pub total_cash: u32,
    pub operators: Vec<SummaryEntry>,
    pub courses: Vec<SummaryEntry>,
}

/// One cell of the materialized schedule table
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(u64),
    Text(String),
}

impl Cell {
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

/// Flat table form of a schedule: labeled rows under a single header.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ScheduleTable {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TableRow {
    pub label: String,
    pub cells: Vec<Cell>,
}

/// Activity parse request
#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    #[serde(default)]
    pub code: Option<String>,
}

/// API Response
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}
