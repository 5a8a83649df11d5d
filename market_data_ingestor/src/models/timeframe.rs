use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeFrameError {
    #[error("Invalid amount for {:?}: {}", unit, message)]
    InvalidAmount {
        unit: TimeFrameUnit,
        message: String,
    },

    #[error("Invalid input: {}", message)]
    InvalidInput { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFrameUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFrame {
    pub amount: u32,
    pub unit: TimeFrameUnit,
}

impl TimeFrame {
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Self {
        Self { amount, unit }
    }

    /// One trading session.
    pub fn day() -> Self {
        Self::new(1, TimeFrameUnit::Day)
    }

    /// Checks the amount against the ranges market data vendors commonly accept.
    pub fn validate(&self) -> Result<(), TimeFrameError> {
        let unit = self.unit;
        match unit {
            TimeFrameUnit::Minute if !(1..=59).contains(&self.amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Minute units can only be used with amounts between 1-59.".into(),
                })
            }
            TimeFrameUnit::Hour if !(1..=23).contains(&self.amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Hour units can only be used with amounts 1-23".into(),
                })
            }
            TimeFrameUnit::Day | TimeFrameUnit::Week if self.amount != 1 => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Day and Week units can only be used with amount 1".into(),
                })
            }
            TimeFrameUnit::Month if ![1, 2, 3, 6, 12].contains(&self.amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Month units can only be used with amount 1, 2, 3, 6 and 12".into(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TimeFrameUnit::Minute => "Min",
            TimeFrameUnit::Hour => "Hour",
            TimeFrameUnit::Day => "Day",
            TimeFrameUnit::Week => "Week",
            TimeFrameUnit::Month => "Month",
        };
        write!(f, "{}{}", self.amount, unit)
    }
}
