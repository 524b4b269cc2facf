//! Change detection between successive snapshots.
//!
//! Department schedules are compared on availability keys only, so a
//! reordered or cosmetically different response does not notify. Doctor
//! slot lists are compared record-for-record, so a memo or time-label
//! change on an otherwise identical slot does.

use shared_types::{AvailableSlot, DeptSchedule};
use std::collections::BTreeMap;

/// (doctor code, day, memo) of each available slot, sorted
fn availability_keys(schedule: &DeptSchedule) -> Vec<(&str, &str, &str)> {
    let mut keys: Vec<_> = schedule
        .available_slots()
        .map(|slot| {
            (
                slot.doc_code.as_str(),
                slot.day.as_str(),
                slot.resource_memo.as_str(),
            )
        })
        .collect();
    keys.sort_unstable();
    keys
}

pub fn department_changed(old: Option<&DeptSchedule>, new: &DeptSchedule) -> bool {
    match old {
        None => true,
        Some(old) => availability_keys(old) != availability_keys(new),
    }
}

fn slot_fingerprints(slots: &[AvailableSlot]) -> serde_json::Result<Vec<String>> {
    let mut fingerprints = slots
        .iter()
        .map(serde_json::to_string)
        .collect::<serde_json::Result<Vec<_>>>()?;
    fingerprints.sort_unstable();
    Ok(fingerprints)
}

/// An empty previous list counts as no previous list.
pub fn doctor_changed(old: Option<&[AvailableSlot]>, new: &[AvailableSlot]) -> bool {
    let old = match old {
        Some(old) if !old.is_empty() => old,
        _ => return true,
    };

    match (slot_fingerprints(old), slot_fingerprints(new)) {
        (Ok(old), Ok(new)) => old != new,
        _ => true,
    }
}

/// Slots grouped by date, dates ascending, slots in arrival order
pub fn group_by_date(slots: &[AvailableSlot]) -> BTreeMap<&str, Vec<&AvailableSlot>> {
    let mut groups: BTreeMap<&str, Vec<&AvailableSlot>> = BTreeMap::new();
    for slot in slots {
        groups.entry(slot.date.as_str()).or_default().push(slot);
    }
    groups
}

pub fn any_first_visit(slots: &[AvailableSlot]) -> bool {
    slots.iter().any(|slot| slot.haji)
}
