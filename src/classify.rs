// Record classification: derive Status from extracted times and route
use crate::types::{is_blank, FlightRecord, Status};

/// Derive the record's status. The order of the checks matters: a leg that
/// never got airborne is Not Flown even when its route is valid.
pub fn classify(mut record: FlightRecord) -> FlightRecord {
    record.status = status_of(&record);
    record
}

pub fn status_of(record: &FlightRecord) -> Status {
    if is_blank(&record.takeoff) && is_blank(&record.landing) {
        Status::NotFlown
    } else if record.is_same_station() {
        Status::Cancelled
    } else {
        Status::Completed
    }
}
