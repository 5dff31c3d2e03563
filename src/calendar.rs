use chrono::{NaiveTime, TimeDelta};

use crate::engine::EngineError;
use crate::limits::MAX_SLOTS_PER_DAY;

pub const DEFAULT_OPENING_HOUR: u32 = 10;
pub const DEFAULT_CLOSING_HOUR: u32 = 15;

fn on_the_hour(h: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default()
}

/// Every `opening + k * step` that is `<= closing`, in ascending order.
///
/// The closing time is itself a valid start when it lands on the grid, so
/// 10:00..=15:00 at one hour yields six slots. Steps never wrap past
/// midnight. A non-positive step yields nothing.
pub fn generate_slots(opening: NaiveTime, closing: NaiveTime, step: TimeDelta) -> Vec<NaiveTime> {
    let mut slots = Vec::new();
    if step <= TimeDelta::zero() {
        return slots;
    }
    let mut current = opening;
    while current <= closing && slots.len() < MAX_SLOTS_PER_DAY {
        slots.push(current);
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }
    slots
}

/// The daily visiting schedule: fixed-width slots between opening and closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCalendar {
    opening: NaiveTime,
    closing: NaiveTime,
    step: TimeDelta,
}

impl Default for SlotCalendar {
    fn default() -> Self {
        Self {
            opening: on_the_hour(DEFAULT_OPENING_HOUR),
            closing: on_the_hour(DEFAULT_CLOSING_HOUR),
            step: TimeDelta::hours(1),
        }
    }
}

impl SlotCalendar {
    pub fn new(opening: NaiveTime, closing: NaiveTime, step: TimeDelta) -> Result<Self, EngineError> {
        if step <= TimeDelta::zero() {
            return Err(EngineError::Config("slot step must be positive".into()));
        }
        if opening > closing {
            return Err(EngineError::Config(format!(
                "opening {opening} is after closing {closing}"
            )));
        }
        Ok(Self { opening, closing, step })
    }

    pub fn opening(&self) -> NaiveTime {
        self.opening
    }

    pub fn closing(&self) -> NaiveTime {
        self.closing
    }

    pub fn step(&self) -> TimeDelta {
        self.step
    }

    pub fn slots(&self) -> Vec<NaiveTime> {
        generate_slots(self.opening, self.closing, self.step)
    }

    /// True if `time` is one of the slot starts this calendar produces.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if time < self.opening || time > self.closing {
            return false;
        }
        self.slots().binary_search(&time).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn default_day_has_six_hourly_slots() {
        let slots = SlotCalendar::default().slots();
        assert_eq!(
            slots,
            vec![t(10, 0), t(11, 0), t(12, 0), t(13, 0), t(14, 0), t(15, 0)]
        );
    }

    #[test]
    fn closing_is_inclusive_only_on_grid() {
        let slots = generate_slots(t(10, 0), t(11, 30), TimeDelta::hours(1));
        assert_eq!(slots, vec![t(10, 0), t(11, 0)]);
    }

    #[test]
    fn opening_equal_to_closing_yields_one_slot() {
        let slots = generate_slots(t(12, 0), t(12, 0), TimeDelta::hours(1));
        assert_eq!(slots, vec![t(12, 0)]);
    }

    #[test]
    fn opening_after_closing_yields_nothing() {
        assert!(generate_slots(t(16, 0), t(10, 0), TimeDelta::hours(1)).is_empty());
    }

    #[test]
    fn non_positive_step_yields_nothing() {
        assert!(generate_slots(t(10, 0), t(15, 0), TimeDelta::zero()).is_empty());
        assert!(generate_slots(t(10, 0), t(15, 0), TimeDelta::hours(-1)).is_empty());
    }

    #[test]
    fn steps_do_not_wrap_past_midnight() {
        let slots = generate_slots(t(22, 0), t(23, 59), TimeDelta::hours(1));
        assert_eq!(slots, vec![t(22, 0), t(23, 0)]);
    }

    #[test]
    fn half_hour_grid() {
        let cal = SlotCalendar::new(t(10, 0), t(11, 0), TimeDelta::minutes(30)).unwrap();
        assert_eq!(cal.slots(), vec![t(10, 0), t(10, 30), t(11, 0)]);
        assert!(cal.contains(t(10, 30)));
        assert!(!cal.contains(t(10, 15)));
    }

    #[test]
    fn contains_matches_generated_slots() {
        let cal = SlotCalendar::default();
        for slot in cal.slots() {
            assert!(cal.contains(slot));
        }
        assert!(!cal.contains(t(9, 0)));
        assert!(!cal.contains(t(16, 0)));
        assert!(!cal.contains(t(11, 30)));
    }

    #[test]
    fn new_rejects_bad_schedule() {
        assert!(matches!(
            SlotCalendar::new(t(15, 0), t(10, 0), TimeDelta::hours(1)),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            SlotCalendar::new(t(10, 0), t(15, 0), TimeDelta::zero()),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let cal = SlotCalendar::default();
        assert_eq!(cal.slots(), cal.slots());
    }
}
