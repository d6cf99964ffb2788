//! Pickup locations and bookable time slots.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use verdant_core::{LocationId, ScheduleId};

/// A nursery pickup location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupLocation {
    pub id: LocationId,
    pub name: String,
    pub street: String,
    pub city: String,
    /// Two-letter state code; pickup orders are taxed in this state.
    pub state: String,
    pub active: bool,
}

/// A bookable pickup window at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupSlot {
    pub schedule_id: ScheduleId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: u32,
    pub booked_count: u32,
}

impl PickupSlot {
    /// Remaining bookable capacity.
    #[must_use]
    pub const fn slots_available(&self) -> u32 {
        self.capacity.saturating_sub(self.booked_count)
    }

    /// Full slots are shown but cannot be selected.
    #[must_use]
    pub const fn is_selectable(&self) -> bool {
        self.slots_available() > 0
    }
}

/// Slots for one calendar date, for grouped display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDay {
    pub date: NaiveDate,
    pub slots: Vec<PickupSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(capacity: u32, booked: u32) -> PickupSlot {
        PickupSlot {
            schedule_id: ScheduleId::new("sched_1"),
            date: NaiveDate::from_ymd_opt(2026, 5, 4).expect("valid date"),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).expect("valid time"),
            capacity,
            booked_count: booked,
        }
    }

    #[test]
    fn test_slots_available() {
        assert_eq!(slot(10, 4).slots_available(), 6);
        assert_eq!(slot(4, 4).slots_available(), 0);
        // over-booked never underflows
        assert_eq!(slot(4, 9).slots_available(), 0);
    }

    #[test]
    fn test_full_slot_not_selectable() {
        assert!(slot(10, 9).is_selectable());
        assert!(!slot(10, 10).is_selectable());
    }
}
