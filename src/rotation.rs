// Rotation assignment: chain sorted legs into numbered round trips
//
// Legs are sorted by (Registration, Date, ATD) and walked once. A rotation grows
// while each next leg departs from the previous arrival, and closes the moment a
// leg arrives back at the rotation's first departure. A leg that does not chain
// starts the next rotation. The walk never looks ahead or backtracks.

use crate::dates::{normalize_time, parse_flight_date};
use crate::types::FlightRecord;
use chrono::NaiveDate;
use std::cmp::Ordering;
use tracing::debug;

/// Sort key for one leg. Values that do not parse sort after all that do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegKey {
    pub registration: Option<String>,
    pub date: Option<NaiveDate>,
    pub atd: Option<String>,
}

impl LegKey {
    pub fn of(record: &FlightRecord) -> Self {
        Self {
            registration: record
                .registration
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            date: record.date.as_deref().and_then(parse_flight_date),
            atd: record.atd.as_deref().and_then(normalize_time),
        }
    }
}

fn missing_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Ord for LegKey {
    fn cmp(&self, other: &Self) -> Ordering {
        missing_last(&self.registration, &other.registration)
            .then_with(|| missing_last(&self.date, &other.date))
            .then_with(|| missing_last(&self.atd, &other.atd))
    }
}

impl PartialOrd for LegKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort the table and annotate every leg with its rotation number.
///
/// Records whose departure equals their arrival stay in the table with
/// rotation 0 and never take part in chaining.
pub fn assign_rotations(records: Vec<FlightRecord>) -> Vec<FlightRecord> {
    let mut keyed: Vec<(LegKey, FlightRecord)> = records
        .into_iter()
        .map(|r| (LegKey::of(&r), r))
        .collect();
    // sort_by is stable: ties keep input order
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut sorted: Vec<FlightRecord> = keyed.into_iter().map(|(_, r)| r).collect();

    let valid: Vec<usize> = sorted
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.is_same_station())
        .map(|(i, _)| i)
        .collect();

    let rotations = {
        let legs: Vec<&FlightRecord> = valid.iter().map(|&i| &sorted[i]).collect();
        chain_rotations(&legs)
    };

    for record in sorted.iter_mut() {
        record.rotation = 0;
    }
    for (position, &index) in valid.iter().enumerate() {
        sorted[index].rotation = rotations[position];
    }

    debug!(
        legs = sorted.len(),
        chained = valid.len(),
        rotations = rotations.last().copied().unwrap_or(0),
        "assigned rotations"
    );
    sorted
}

/// Greedy single pass over legs that are already sorted and filtered.
/// Returns one rotation number per leg, starting at 1.
pub fn chain_rotations(legs: &[&FlightRecord]) -> Vec<u32> {
    let n = legs.len();
    let mut rotations = vec![0; n];
    let mut global_rotation = 0;
    let mut i = 0;

    while i < n {
        let current = global_rotation + 1;
        let start_dep = legs[i].dep.as_deref();
        let mut last_arr = legs[i].arr.as_deref();
        let mut closed = false;
        let mut j = i + 1;

        while j < n && same_aircraft(legs[i], legs[j]) && departs_from(legs[j], last_arr) {
            last_arr = legs[j].arr.as_deref();
            if last_arr.is_some() && last_arr == start_dep {
                closed = true;
                break;
            }
            j += 1;
        }

        let end = if closed { j + 1 } else { j };
        rotations[i..end].fill(current);
        global_rotation = current;
        i = end;
    }

    rotations
}

fn same_aircraft(a: &FlightRecord, b: &FlightRecord) -> bool {
    a.registration.as_deref().map(str::trim) == b.registration.as_deref().map(str::trim)
}

fn departs_from(leg: &FlightRecord, station: Option<&str>) -> bool {
    matches!((leg.dep.as_deref(), station), (Some(dep), Some(arr)) if dep == arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Status;

    fn leg(reg: &str, date: &str, atd: &str, dep: &str, arr: &str) -> FlightRecord {
        FlightRecord {
            enquiry_no: reg.to_string(),
            registration: Some(reg.to_string()),
            date: Some(date.to_string()),
            atd: Some(atd.to_string()),
            dep: Some(dep.to_string()),
            arr: Some(arr.to_string()),
            filename: format!("{reg}-{date}-{atd}.pdf"),
            ..FlightRecord::default()
        }
    }

    fn routes(records: &[FlightRecord]) -> Vec<(String, u32)> {
        records
            .iter()
            .map(|r| {
                (
                    format!("{}-{}", r.dep.as_deref().unwrap_or(""), r.arr.as_deref().unwrap_or("")),
                    r.rotation,
                )
            })
            .collect()
    }

    #[test]
    fn test_round_trip_then_unrelated_leg() {
        let records = vec![
            leg("9H-SLD", "11-Jul-25", "18:00", "BLR", "GOA"),
            leg("9H-SLD", "11-Jul-25", "14:00", "BOM", "DEL"),
            leg("9H-SLD", "11-Jul-25", "09:00", "DEL", "BOM"),
        ];
        let out = assign_rotations(records);
        assert_eq!(
            routes(&out),
            vec![
                ("DEL-BOM".to_string(), 1),
                ("BOM-DEL".to_string(), 1),
                ("BLR-GOA".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_three_leg_closure() {
        let records = vec![
            leg("9H-SLD", "11-Jul-25", "06:00", "AAA", "BBB"),
            leg("9H-SLD", "11-Jul-25", "08:00", "BBB", "CCC"),
            leg("9H-SLD", "11-Jul-25", "10:00", "CCC", "AAA"),
            leg("9H-SLD", "11-Jul-25", "12:00", "AAA", "BBB"),
        ];
        let out = assign_rotations(records);
        let numbers: Vec<u32> = out.iter().map(|r| r.rotation).collect();
        assert_eq!(numbers, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_broken_chain_starts_next_rotation_immediately() {
        let records = vec![
            leg("9H-SLD", "11-Jul-25", "06:00", "AAA", "BBB"),
            leg("9H-SLD", "11-Jul-25", "08:00", "CCC", "DDD"),
            leg("9H-SLD", "11-Jul-25", "10:00", "DDD", "EEE"),
        ];
        let out = assign_rotations(records);
        let numbers: Vec<u32> = out.iter().map(|r| r.rotation).collect();
        assert_eq!(numbers, vec![1, 2, 2]);
    }

    #[test]
    fn test_closure_stops_at_first_return() {
        // AAA-BBB-AAA closes; the following AAA-CCC-AAA is its own rotation
        let records = vec![
            leg("9H-SLD", "11-Jul-25", "06:00", "AAA", "BBB"),
            leg("9H-SLD", "11-Jul-25", "08:00", "BBB", "AAA"),
            leg("9H-SLD", "11-Jul-25", "10:00", "AAA", "CCC"),
            leg("9H-SLD", "11-Jul-25", "12:00", "CCC", "AAA"),
        ];
        let out = assign_rotations(records);
        let numbers: Vec<u32> = out.iter().map(|r| r.rotation).collect();
        assert_eq!(numbers, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_cancelled_route_is_skipped_by_chaining() {
        let mut cancelled = leg("9H-SLD", "11-Jul-25", "08:00", "BOM", "BOM");
        cancelled.status = Status::Cancelled;
        let records = vec![
            leg("9H-SLD", "11-Jul-25", "06:00", "DEL", "BOM"),
            cancelled,
            leg("9H-SLD", "11-Jul-25", "10:00", "BOM", "DEL"),
        ];
        let out = assign_rotations(records);
        assert_eq!(
            routes(&out),
            vec![
                ("DEL-BOM".to_string(), 1),
                ("BOM-BOM".to_string(), 0),
                ("BOM-DEL".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_chains_do_not_cross_registrations() {
        let records = vec![
            leg("9H-SLD", "11-Jul-25", "06:00", "DEL", "BOM"),
            leg("9H-SLE", "11-Jul-25", "07:00", "BOM", "DEL"),
        ];
        let out = assign_rotations(records);
        let numbers: Vec<u32> = out.iter().map(|r| r.rotation).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_sort_is_by_date_then_departure_time() {
        let records = vec![
            leg("9H-SLD", "12-Jul-25", "06:00", "BOM", "DEL"),
            leg("9H-SLD", "11-Jul-25", "23:00", "DEL", "BOM"),
        ];
        let out = assign_rotations(records);
        assert_eq!(out[0].date.as_deref(), Some("11-Jul-25"));
        assert_eq!(out[0].rotation, 1);
        assert_eq!(out[1].rotation, 1);
    }

    #[test]
    fn test_ties_keep_input_order_and_bad_values_sort_last() {
        let mut no_time = leg("9H-SLD", "11-Jul-25", "??", "XXX", "YYY");
        no_time.filename = "no-time.pdf".to_string();
        let mut first = leg("9H-SLD", "11-Jul-25", "09:00", "AAA", "BBB");
        first.filename = "first.pdf".to_string();
        let mut second = leg("9H-SLD", "11-Jul-25", "09:00", "CCC", "DDD");
        second.filename = "second.pdf".to_string();

        let out = assign_rotations(vec![no_time, first, second]);
        let names: Vec<&str> = out.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["first.pdf", "second.pdf", "no-time.pdf"]);
    }

    #[test]
    fn test_empty_table() {
        assert!(assign_rotations(Vec::new()).is_empty());
        assert!(chain_rotations(&[]).is_empty());
    }
}
