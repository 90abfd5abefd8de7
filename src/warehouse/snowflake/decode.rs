//! Decoding of JSON rowsets into typed values.
//!
//! In JSON result format every cell arrives as a string (or null) and its
//! meaning depends on the column's declared type:
//!
//! | type            | wire form                              |
//! |-----------------|----------------------------------------|
//! | `fixed`         | decimal text; scale from `rowtype`     |
//! | `real`          | float text (`inf`, `NaN` allowed)      |
//! | `boolean`       | `1`/`0` or `true`/`false`              |
//! | `date`          | days since epoch                       |
//! | `time`          | `<seconds>.<fraction>` since midnight  |
//! | `timestamp_ntz` | `<seconds>.<fraction>` since epoch     |
//! | `timestamp_ltz` | same, as a UTC instant                 |
//! | `timestamp_tz`  | `<seconds>.<fraction> <offset + 1440>` |
//! | `binary`        | hex                                    |

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::warehouse::{ColumnInfo, Row, Value};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Days from 0001-01-01 (CE) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Offsets in `timestamp_tz` values are shifted by this many minutes.
const TZ_OFFSET_BIAS_MINUTES: i64 = 1440;

/// Column description from the query response.
#[derive(Debug, Clone, Deserialize)]
pub struct RowType {
    pub name: String,

    #[serde(rename = "type")]
    pub r#type: String,

    #[allow(unused)]
    pub precision: Option<i64>,
    pub scale: Option<i64>,

    #[allow(unused)]
    #[serde(default)]
    pub nullable: bool,
}

impl From<&RowType> for ColumnInfo {
    fn from(value: &RowType) -> Self {
        ColumnInfo::new(value.name.clone(), value.r#type.to_lowercase())
    }
}

/// Decodes a batch of raw rows against the column layout.
pub fn decode_rows(rowtype: &[RowType], rows: Vec<Vec<Option<String>>>) -> Result<Vec<Row>> {
    rows.into_iter()
        .map(|raw| {
            if raw.len() != rowtype.len() {
                return Err(AppError::execution(format!(
                    "Row has {} cells but the result has {} columns",
                    raw.len(),
                    rowtype.len()
                )));
            }
            raw.iter()
                .zip(rowtype)
                .map(|(cell, column)| decode_value(cell.as_deref(), column))
                .collect()
        })
        .collect()
}

/// Decodes one cell.
pub fn decode_value(raw: Option<&str>, column: &RowType) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };

    let invalid = |what: &str| {
        AppError::execution(format!(
            "Invalid {what} value '{raw}' in column {}",
            column.name
        ))
    };

    let value = match column.r#type.to_lowercase().as_str() {
        "fixed" | "number" => decode_fixed(raw, column.scale.unwrap_or(0))
            .ok_or_else(|| invalid("numeric"))?,
        "real" => Value::Float(raw.parse().map_err(|_| invalid("float"))?),
        "boolean" => match raw {
            "1" | "true" | "TRUE" => Value::Bool(true),
            "0" | "false" | "FALSE" => Value::Bool(false),
            _ => return Err(invalid("boolean")),
        },
        "binary" => Value::Bytes(hex::decode(raw).map_err(|_| invalid("binary"))?),
        "date" => {
            let days: i32 = raw.parse().map_err(|_| invalid("date"))?;
            days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .map(Value::Date)
                .ok_or_else(|| invalid("date"))?
        }
        "time" => {
            parse_epoch_nanos(raw)
                .and_then(split_nanos)
                .and_then(|(secs, frac)| Some((u32::try_from(secs).ok()?, frac)))
                .and_then(|(secs, frac)| {
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, frac)
                })
                .map(Value::Time)
                .ok_or_else(|| invalid("time"))?
        }
        "timestamp" | "timestamp_ntz" | "timestamp_ltz" => {
            let nanos = parse_epoch_nanos(raw).ok_or_else(|| invalid("timestamp"))?;
            Value::Timestamp(naive_from_nanos(nanos).ok_or_else(|| invalid("timestamp"))?)
        }
        "timestamp_tz" => {
            let mut parts = raw.split_whitespace();
            let epoch = parts.next().ok_or_else(|| invalid("timestamp"))?;
            let utc = parse_epoch_nanos(epoch)
                .and_then(naive_from_nanos)
                .ok_or_else(|| invalid("timestamp"))?;
            let wall = match parts.next() {
                Some(offset) => offset
                    .parse::<i64>()
                    .ok()
                    .and_then(|offset| offset.checked_sub(TZ_OFFSET_BIAS_MINUTES))
                    .and_then(Duration::try_minutes)
                    .and_then(|shift| utc.checked_add_signed(shift))
                    .ok_or_else(|| invalid("timestamp"))?,
                None => utc,
            };
            Value::Timestamp(wall)
        }
        "text" | "char" | "varchar" | "string" | "variant" | "object" | "array" | "any" => {
            Value::String(raw.to_string())
        }
        other => {
            debug!("Column {} has unhandled type '{}', keeping text", column.name, other);
            Value::String(raw.to_string())
        }
    };

    Ok(value)
}

/// Integers stay integers; anything with a scale, or too wide for i64, is a decimal.
fn decode_fixed(raw: &str, scale: i64) -> Option<Value> {
    if scale == 0 {
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Value::Int(i));
        }
    }
    if let Ok(d) = Decimal::from_str(raw) {
        return Some(Value::Decimal(d));
    }
    // Wider than 28 digits: keep as much precision as a float allows.
    raw.parse::<f64>().ok().map(Value::Float)
}

/// Parses `<seconds>.<fraction>` into nanoseconds.
fn parse_epoch_nanos(raw: &str) -> Option<i128> {
    let negative = raw.starts_with('-');
    let unsigned = raw.trim_start_matches(['-', '+']);
    let (secs, frac) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let secs: i128 = secs.parse().ok()?;
    if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let frac: i128 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}").parse().ok()?
    };

    let total = secs.checked_mul(NANOS_PER_SEC)?.checked_add(frac)?;
    Some(if negative { -total } else { total })
}

fn split_nanos(nanos: i128) -> Option<(i64, u32)> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let frac = u32::try_from(nanos.rem_euclid(NANOS_PER_SEC)).ok()?;
    Some((secs, frac))
}

fn naive_from_nanos(nanos: i128) -> Option<NaiveDateTime> {
    let (secs, frac) = split_nanos(nanos)?;
    DateTime::from_timestamp(secs, frac).map(|dt| dt.naive_utc())
}
