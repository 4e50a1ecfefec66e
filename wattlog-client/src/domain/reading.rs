use time::PrimitiveDateTime;

/// One half-hourly meter reading.
///
/// Timestamps are naive local time, exactly as printed in the supplier's export.
/// The pair `(start_time, end_time)` identifies a reading.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub start_time: PrimitiveDateTime,
    pub end_time: PrimitiveDateTime,
    pub consumption_kwh: f64,
}

impl Reading {
    pub fn new(start_time: PrimitiveDateTime, end_time: PrimitiveDateTime, consumption_kwh: f64) -> Self {
        Self {
            start_time,
            end_time,
            consumption_kwh,
        }
    }

    pub fn key(&self) -> (PrimitiveDateTime, PrimitiveDateTime) {
        (self.start_time, self.end_time)
    }
}
