use crate::pipeline::{Envelope, PipelineError, Transform};
use time::macros::datetime;
use wattlog_client::domain::Reading;

/// Pure validation of a parsed `Reading`.
///
/// Rules:
/// - consumption must be non-negative.
/// - the interval must be non-empty (`start_time < end_time`).
/// - start_time must be within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_reading(env: Envelope<Reading>) -> Result<Envelope<Reading>, PipelineError> {
    let r = &env.payload;
    let reject = |reason: &str| PipelineError::Transform {
        row: env.row,
        reason: reason.to_string(),
    };

    if r.consumption_kwh < 0.0 {
        return Err(reject("consumption must be non-negative"));
    }

    if r.start_time >= r.end_time {
        return Err(reject("start time must precede end time"));
    }

    let min_ts = datetime!(2000-01-01 00:00:00);
    let max_ts = datetime!(2100-01-01 00:00:00);

    if r.start_time < min_ts || r.start_time > max_ts {
        return Err(reject("timestamp out of allowed range"));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<Reading, Reading> for ReadingValidation {
    async fn apply(&self, input: Envelope<Reading>) -> Result<Envelope<Reading>, PipelineError> {
        match validate_reading(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_reading_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
