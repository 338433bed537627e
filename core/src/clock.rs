//! Order clock: owns the order-date cursor and the iteration count.

use crate::calendar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderClock {
    pub today:           NaiveDate,
    pub last_order_date: Option<NaiveDate>,
    pub iteration:       u32,
    /// Index of the last step that runs.
    pub cap:             u32,
}

impl OrderClock {
    pub fn new(start: NaiveDate, cap: u32) -> Self {
        Self {
            today: start,
            last_order_date: None,
            iteration: 0,
            cap,
        }
    }

    /// True once the step at `iteration == cap` has run.
    pub fn is_exhausted(&self) -> bool {
        self.iteration > self.cap
    }

    /// Move to the next order day. Returns the new date.
    pub fn advance(&mut self) -> NaiveDate {
        self.last_order_date = Some(self.today);
        self.today = calendar::next_order_date(self.today);
        self.iteration += 1;
        self.today
    }
}
