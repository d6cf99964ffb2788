//! Pickup location and slot planning.
//!
//! Wraps the pickup directory with display policy: inactive locations are
//! hidden, slots already ended today are dropped, and the remainder comes
//! back sorted by date then start time and grouped per day.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::instrument;

use verdant_core::LocationId;

use crate::error::CheckoutError;
use crate::models::{PickupLocation, PickupSlot, SlotDay};
use crate::services::PickupDirectory;

/// Slot planner over the pickup directory.
#[derive(Clone)]
pub struct PickupPlanner {
    directory: Arc<dyn PickupDirectory>,
}

impl PickupPlanner {
    #[must_use]
    pub fn new(directory: Arc<dyn PickupDirectory>) -> Self {
        Self { directory }
    }

    /// Active pickup locations.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory call fails.
    #[instrument(skip(self))]
    pub async fn locations(&self) -> Result<Vec<PickupLocation>, CheckoutError> {
        let mut locations = self.directory.list_locations().await?;
        locations.retain(|l| l.active);
        Ok(locations)
    }

    /// Bookable slots for a location over a date range, grouped by date.
    ///
    /// `now` is the customer's current local time; slots whose end time has
    /// already passed today are excluded. Full slots remain in the result
    /// (they are shown but not selectable).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory call fails.
    #[instrument(skip(self), fields(location = %location))]
    pub async fn slot_days(
        &self,
        location: &LocationId,
        from: NaiveDate,
        to: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<Vec<SlotDay>, CheckoutError> {
        let slots = self.directory.list_slots(location, from, to).await?;
        Ok(group_slots(slots, now))
    }
}

/// Filter, sort, and group slots for display.
#[must_use]
pub fn group_slots(mut slots: Vec<PickupSlot>, now: NaiveDateTime) -> Vec<SlotDay> {
    slots.retain(|s| s.date > now.date() || (s.date == now.date() && s.end_time > now.time()));
    slots.sort_by(|a, b| a.date.cmp(&b.date).then(a.start_time.cmp(&b.start_time)));

    let mut days: Vec<SlotDay> = Vec::new();
    for slot in slots {
        match days.last_mut() {
            Some(day) if day.date == slot.date => day.slots.push(slot),
            _ => days.push(SlotDay {
                date: slot.date,
                slots: vec![slot],
            }),
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, Timelike};

    use verdant_core::ScheduleId;

    use super::*;

    fn slot(id: &str, date: (i32, u32, u32), start_h: u32, end_h: u32) -> PickupSlot {
        PickupSlot {
            schedule_id: ScheduleId::new(id),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("valid date"),
            start_time: NaiveTime::from_hms_opt(start_h, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(end_h, 0, 0).expect("valid time"),
            capacity: 10,
            booked_count: 0,
        }
    }

    fn at(date: (i32, u32, u32), hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .expect("valid date")
            .and_hms_opt(hour, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn test_slots_already_ended_today_are_dropped() {
        let days = group_slots(
            vec![
                slot("morning", (2026, 5, 4), 9, 11),
                slot("afternoon", (2026, 5, 4), 14, 16),
            ],
            at((2026, 5, 4), 12),
        );

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].slots.len(), 1);
        assert_eq!(days[0].slots[0].schedule_id, ScheduleId::new("afternoon"));
    }

    #[test]
    fn test_slots_sorted_by_date_then_start() {
        let days = group_slots(
            vec![
                slot("b", (2026, 5, 5), 14, 16),
                slot("c", (2026, 5, 6), 9, 11),
                slot("a", (2026, 5, 5), 9, 11),
            ],
            at((2026, 5, 1), 8),
        );

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 5, 5).expect("date"));
        assert_eq!(days[0].slots[0].start_time.hour(), 9);
        assert_eq!(days[0].slots[1].start_time.hour(), 14);
        assert_eq!(days[1].slots[0].schedule_id, ScheduleId::new("c"));
    }

    #[test]
    fn test_full_slots_stay_listed() {
        let mut full = slot("full", (2026, 5, 5), 9, 11);
        full.booked_count = full.capacity;

        let days = group_slots(vec![full.clone()], at((2026, 5, 1), 8));
        assert_eq!(days[0].slots[0], full);
        assert!(!days[0].slots[0].is_selectable());
    }

    #[tokio::test]
    async fn test_inactive_locations_hidden() {
        use crate::services::MockPickupDirectory;

        let mut directory = MockPickupDirectory::new();
        directory.expect_list_locations().returning(|| {
            Ok(vec![
                PickupLocation {
                    id: LocationId::new("loc_open"),
                    name: "Eastside Greenhouse".to_owned(),
                    street: "12 Fern Rd".to_owned(),
                    city: "Athens".to_owned(),
                    state: "GA".to_owned(),
                    active: true,
                },
                PickupLocation {
                    id: LocationId::new("loc_closed"),
                    name: "Old Yard".to_owned(),
                    street: "9 Moss Ln".to_owned(),
                    city: "Athens".to_owned(),
                    state: "GA".to_owned(),
                    active: false,
                },
            ])
        });

        let planner = PickupPlanner::new(Arc::new(directory));
        let locations = planner.locations().await.expect("locations");
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].id, LocationId::new("loc_open"));
    }
}
