//! Qualifier annotation.
//!
//! BUFR encodes sensor height and averaging period as standalone records
//! that apply to every following measurement until the next record of the
//! same kind. One left-to-right pass copies the active qualifier onto each
//! measurement record.

use crate::constants::{HEIGHT_QUALIFIER_CODES, TIME_PERIOD_KEY, TIME_QUALIFIER_CODES};
use crate::models::{Qualifier, Record};

pub fn is_height_qualifier(record: &Record) -> bool {
    HEIGHT_QUALIFIER_CODES.contains(&record.code.as_str())
}

pub fn is_time_qualifier(record: &Record) -> bool {
    TIME_QUALIFIER_CODES.contains(&record.code.as_str())
}

/// True for records that describe other records rather than measure anything
pub fn is_qualifier(record: &Record) -> bool {
    is_height_qualifier(record) || is_time_qualifier(record)
}

fn activate(record: &Record) -> Option<Qualifier> {
    if record.value.is_missing() {
        None
    } else {
        Some(record.as_qualifier())
    }
}

/// Attach the active height and time qualifiers to every record of a subset.
///
/// A qualifier whose value is missing clears the active qualifier of its
/// kind. Records keyed `timePeriod` never receive a height. Existing
/// annotations are overwritten, so annotating twice changes nothing.
pub fn annotate(subset: &mut [Record]) {
    let mut height: Option<Qualifier> = None;
    let mut time: Option<Qualifier> = None;

    for record in subset.iter_mut() {
        if is_height_qualifier(record) {
            height = activate(record);
            record.height = None;
            record.time = time.clone();
            continue;
        }
        if is_time_qualifier(record) {
            time = activate(record);
            record.time = None;
            record.height = if record.key == TIME_PERIOD_KEY {
                None
            } else {
                height.clone()
            };
            continue;
        }

        record.height = if record.key == TIME_PERIOD_KEY {
            None
        } else {
            height.clone()
        };
        record.time = time.clone();
    }
}
