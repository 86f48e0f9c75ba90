use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiResult;

/// `dd/mm/yy`, the short form used on bed cards and volunteer lists.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%y").to_string()
}

/// Planting-to-harvest period, e.g. `01/03/24 - 30/06/24`.
pub fn format_period(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", format_date(start), format_date(end))
}

/// Drops from `update` every field whose value already equals `base`.
///
/// Update forms start pre-filled with the entity, so only the edited fields
/// should travel in the PUT body.
pub fn diff_update<B, U>(base: &B, update: &U) -> ApiResult<Value>
where
    B: Serialize + ?Sized,
    U: Serialize + ?Sized,
{
    let base = serde_json::to_value(base)?;
    let mut update = serde_json::to_value(update)?;

    if let (Value::Object(base), Value::Object(fields)) = (&base, &mut update) {
        fields.retain(|key, value| base.get(key) != Some(value));
    }
    Ok(update)
}
