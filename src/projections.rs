use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, Days, Months, NaiveDate};
use tracing::debug;

use crate::models::{
    Booking, Cell, GuestRow, MonthlySchedule, ScheduleTable, SummaryEntry, TableRow,
};

/// Classifications that put a guest in the water on their booked days.
pub const DIVING_ACTIVITIES: [&str; 5] = ["Diver", "OWC", "AOW", "DSD", "DM"];
/// Classifications that fill the course column.
pub const COURSE_ACTIVITIES: [&str; 2] = ["OWC", "AOW"];
/// Classifications counted by the course summary.
pub const COURSE_SUMMARY_ACTIVITIES: [&str; 4] = ["OWC", "AOW", "DSD", "DM"];

pub const DESCRIPTIVE_COLUMNS: [&str; 4] = ["Tour Operator", "Activity", "Course", "Diving Days"];
pub const TOTAL_GUESTS_ROW: &str = "Total Guests (Diving/Courses)";
pub const TOTAL_CASH_ROW: &str = "Total Cash";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    #[error("year {0} is outside the supported calendar range")]
    InvalidYear(i32),
    #[error("'{year}/{month}' is not a year and month")]
    Malformed { year: String, month: String },
}

/// Read a (year, month) pair from text, e.g. URL segments. Only the shape
/// is checked here; range checks happen in `MonthPeriod::new`.
pub fn parse_period(year: &str, month: &str) -> Result<(i32, u32), ScheduleError> {
    let malformed = || ScheduleError::Malformed {
        year: year.to_string(),
        month: month.to_string(),
    };
    let y = year.trim().parse::<i32>().map_err(|_| malformed())?;
    let m = month.trim().parse::<u32>().map_err(|_| malformed())?;
    Ok((y, m))
}

/// Calendar facts for one (year, month).
#[derive(Debug, Clone, Copy)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
    pub days: u32,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, ScheduleError> {
        if !(1..=12).contains(&month) {
            return Err(ScheduleError::InvalidMonth(month));
        }
        let first_day =
            NaiveDate::from_ymd_opt(year, month, 1).ok_or(ScheduleError::InvalidYear(year))?;
        let last_day = first_day
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or(ScheduleError::InvalidYear(year))?;

        Ok(Self {
            year,
            month,
            days: last_day.day(),
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn day_labels(&self) -> Vec<String> {
        (1..=self.days)
            .map(|day| format!("{:02}-{:02}", self.month, day))
            .collect()
    }
}

/// Projects bookings onto a monthly attendance matrix.
/// Holds only a borrowed view; every call produces a fresh schedule.
pub struct ScheduleProjector<'a> {
    bookings: &'a [Booking],
}

impl<'a> ScheduleProjector<'a> {
    pub fn new(bookings: &'a [Booking]) -> Self {
        Self { bookings }
    }

    /// Bookings arriving within the period, in input order.
    fn month_bookings(&self, period: &MonthPeriod) -> Vec<(&'a Booking, NaiveDate)> {
        self.bookings
            .iter()
            .filter_map(|b| match b.arrival {
                Some(arrival) if period.contains(arrival) => Some((b, arrival)),
                _ => None,
            })
            .collect()
    }

    pub fn project(&self, year: i32, month: u32) -> Result<MonthlySchedule, ScheduleError> {
        let period = MonthPeriod::new(year, month)?;
        let month_bookings = self.month_bookings(&period);

        let undated = self.bookings.iter().filter(|b| b.arrival.is_none()).count();
        debug!(
            year,
            month,
            matched = month_bookings.len(),
            undated,
            "projecting monthly schedule"
        );

        // Earliest arrival first; the stable sort keeps input order on ties.
        let mut by_arrival = month_bookings.clone();
        by_arrival.sort_by_key(|(_, arrival)| *arrival);

        let mut guests: Vec<GuestRow> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for (booking, arrival) in &by_arrival {
            let key = booking.guest_key();
            if !index.contains_key(&key) {
                index.insert(key.clone(), guests.len());
                guests.push(GuestRow {
                    guest: key,
                    tour_operator: String::new(),
                    activity: String::new(),
                    course: String::new(),
                    diving_days: 0,
                    first_arrival: *arrival,
                    days: vec![0; period.days as usize],
                });
            }
        }

        // Descriptive columns are last-write-wins in input order, day marks accumulate.
        for (booking, arrival) in &month_bookings {
            let Some(&row_idx) = index.get(&booking.guest_key()) else {
                continue;
            };
            let row = &mut guests[row_idx];
            let activity = booking.activity_type.as_str();

            row.tour_operator = booking.tour_operator.clone();
            row.activity = booking.activity_type.clone();
            row.course = if COURSE_ACTIVITIES.contains(&activity) {
                booking.activity_type.clone()
            } else {
                String::new()
            };
            row.diving_days = booking.diving_days;

            if DIVING_ACTIVITIES.contains(&activity) {
                mark_diving_days(&mut row.days, *arrival, booking.diving_days, &period);
            }
        }

        let daily_totals: Vec<u32> = (0..period.days as usize)
            .map(|day| guests.iter().map(|g| u32::from(g.days[day])).sum::<u32>())
            .collect();

        let operators = distinct_guests_by(&month_bookings, |b| Some(b.tour_operator.as_str()));
        let courses = distinct_guests_by(&month_bookings, |b| {
            let activity = b.activity_type.as_str();
            COURSE_SUMMARY_ACTIVITIES.contains(&activity).then_some(activity)
        });

        Ok(MonthlySchedule {
            year,
            month,
            day_labels: period.day_labels(),
            guests,
            daily_totals,
            total_cash: 0,
            operators,
            courses,
        })
    }
}

/// Entry point used by handlers: build the schedule for one month.
pub fn build_monthly_schedule(
    bookings: &[Booking],
    year: i32,
    month: u32,
) -> Result<MonthlySchedule, ScheduleError> {
    ScheduleProjector::new(bookings).project(year, month)
}

fn mark_diving_days(days: &mut [u8], arrival: NaiveDate, diving_days: u32, period: &MonthPeriod) {
    // Offsets beyond the month length can never land inside it.
    let limit = diving_days.min(period.days);
    for offset in 0..limit {
        let Some(date) = arrival.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        if !period.contains(date) {
            break;
        }
        if let Some(cell) = days.get_mut(date.day0() as usize) {
            *cell = 1;
        }
    }
}

/// Distinct guest count per group, groups in ascending name order.
fn distinct_guests_by<'b, F>(bookings: &[(&'b Booking, NaiveDate)], group: F) -> Vec<SummaryEntry>
where
    F: Fn(&'b Booking) -> Option<&'b str>,
{
    let mut groups: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for &(booking, _) in bookings {
        if let Some(name) = group(booking) {
            groups.entry(name).or_default().insert(booking.guest_key());
        }
    }

    groups
        .into_iter()
        .map(|(name, guests)| SummaryEntry {
            name: name.to_string(),
            guests: guests.len(),
        })
        .collect()
}

impl MonthlySchedule {
    /// Flatten into the exported layout: descriptive columns, one column per
    /// day, then "Operator N" and "Course N" columns used by the summary rows.
    pub fn to_table(&self) -> ScheduleTable {
        let day_count = self.day_labels.len();
        let operator_count = self.operators.len();
        let course_count = self.courses.len();

        let mut columns: Vec<String> = DESCRIPTIVE_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.extend(self.day_labels.iter().cloned());
        columns.extend((1..=operator_count).map(|i| format!("Operator {}", i)));
        columns.extend((1..=course_count).map(|i| format!("Course {}", i)));

        let summary_zeros = || vec![Cell::Number(0); operator_count + course_count];
        let mut rows = Vec::with_capacity(self.guests.len() + 6);

        for guest in &self.guests {
            let mut cells = vec![
                Cell::Text(guest.tour_operator.clone()),
                Cell::Text(guest.activity.clone()),
                Cell::Text(guest.course.clone()),
                Cell::Number(u64::from(guest.diving_days)),
            ];
            cells.extend(guest.days.iter().map(|d| Cell::Number(u64::from(*d))));
            cells.extend(summary_zeros());
            rows.push(TableRow {
                label: guest.guest.clone(),
                cells,
            });
        }

        let mut totals = vec![Cell::Empty; DESCRIPTIVE_COLUMNS.len()];
        totals.extend(self.daily_totals.iter().map(|t| Cell::Number(u64::from(*t))));
        totals.extend(summary_zeros());
        rows.push(TableRow {
            label: TOTAL_GUESTS_ROW.to_string(),
            cells: totals,
        });

        // The whole cash row is zero-filled, descriptive cells included.
        let cash_cells = DESCRIPTIVE_COLUMNS.len() + day_count;
        let mut cash = vec![Cell::Number(u64::from(self.total_cash)); cash_cells];
        cash.extend(summary_zeros());
        rows.push(TableRow {
            label: TOTAL_CASH_ROW.to_string(),
            cells: cash,
        });

        let lead = DESCRIPTIVE_COLUMNS.len() + day_count;
        let summary_row = |label: &str, offset: usize, values: Vec<Cell>| {
            let mut cells = vec![Cell::Empty; columns.len()];
            for (i, value) in values.into_iter().enumerate() {
                cells[lead + offset + i] = value;
            }
            TableRow {
                label: label.to_string(),
                cells,
            }
        };

        rows.push(summary_row(
            "Tour Operators",
            0,
            self.operators.iter().map(|o| Cell::Text(o.name.clone())).collect(),
        ));
        rows.push(summary_row(
            "Total Guests",
            0,
            self.operators.iter().map(|o| Cell::Number(o.guests as u64)).collect(),
        ));
        rows.push(summary_row(
            "Courses",
            operator_count,
            self.courses.iter().map(|c| Cell::Text(c.name.clone())).collect(),
        ));
        rows.push(summary_row(
            "Total Guests",
            operator_count,
            self.courses.iter().map(|c| Cell::Number(c.guests as u64)).collect(),
        ));

        ScheduleTable { columns, rows }
    }
}
