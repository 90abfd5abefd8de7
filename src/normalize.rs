//! Conversion of warehouse values into spreadsheet-safe forms.
//!
//! Decimals become floats and temporal values become fixed-format text;
//! everything else passes through unchanged. Normalizing an already
//! normalized table is a no-op.

use crate::warehouse::{QueryResult, Row, Value};
use rust_decimal::prelude::ToPrimitive;

/// Format used for combined date-and-time values.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used for date-only values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format used for time-only values.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Normalizes a single cell.
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Decimal(d) => match d.to_f64() {
            Some(f) => Value::Float(f),
            None => Value::String(d.to_string()),
        },
        // Timestamps are matched before dates: they carry a date too.
        Value::Timestamp(ts) => Value::String(ts.format(DATETIME_FORMAT).to_string()),
        Value::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
        Value::Time(t) => Value::String(t.format(TIME_FORMAT).to_string()),
        other => other,
    }
}

/// Normalizes every cell of a row.
pub fn normalize_row(row: Row) -> Row {
    row.into_iter().map(normalize_value).collect()
}

/// Returns a copy of `result` with every cell normalized.
pub fn normalize_table(result: QueryResult) -> QueryResult {
    QueryResult {
        rows: result.rows.into_iter().map(normalize_row).collect(),
        ..result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::ColumnInfo;
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn sample_table() -> QueryResult {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        QueryResult::with_data(
            vec![
                ColumnInfo::new("AMOUNT", "fixed"),
                ColumnInfo::new("AT", "timestamp_ntz"),
                ColumnInfo::new("DAY", "date"),
                ColumnInfo::new("CUTOFF", "time"),
                ColumnInfo::new("NAME", "text"),
                ColumnInfo::new("QTY", "fixed"),
                ColumnInfo::new("NOTE", "text"),
            ],
            vec![vec![
                Value::Decimal(Decimal::from_str("12.50").unwrap()),
                Value::Timestamp(day.and_hms_opt(8, 30, 0).unwrap()),
                Value::Date(day),
                Value::Time(NaiveTime::from_hms_opt(8, 30, 0).unwrap()),
                Value::from("Santiago"),
                Value::Int(3),
                Value::Null,
            ]],
        )
    }

    #[test]
    fn test_decimal_becomes_float() {
        let v = normalize_value(Value::Decimal(Decimal::from_str("12.50").unwrap()));
        assert_eq!(v, Value::Float(12.5));
    }

    #[test]
    fn test_temporal_values_become_text() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(
            normalize_value(Value::Timestamp(day.and_hms_opt(8, 30, 0).unwrap())),
            Value::from("2024-03-05 08:30:00")
        );
        assert_eq!(normalize_value(Value::Date(day)), Value::from("2024-03-05"));
        assert_eq!(
            normalize_value(Value::Time(NaiveTime::from_hms_opt(8, 30, 0).unwrap())),
            Value::from("08:30:00")
        );
    }

    #[test]
    fn test_sub_second_precision_is_dropped() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_milli_opt(8, 30, 0, 750)
            .unwrap();
        assert_eq!(
            normalize_value(Value::Timestamp(ts)),
            Value::from("2024-03-05 08:30:00")
        );
    }

    #[test]
    fn test_other_values_pass_through() {
        for v in [
            Value::Null,
            Value::Bool(true),
            Value::Int(7),
            Value::Float(1.25),
            Value::from("text"),
            Value::Bytes(vec![1, 2]),
        ] {
            assert_eq!(normalize_value(v.clone()), v);
        }
    }

    #[test]
    fn test_normalize_table_keeps_columns() {
        let table = normalize_table(sample_table());
        assert_eq!(table.columns.len(), 7);
        assert_eq!(
            table.rows[0],
            vec![
                Value::Float(12.5),
                Value::from("2024-03-05 08:30:00"),
                Value::from("2024-03-05"),
                Value::from("08:30:00"),
                Value::from("Santiago"),
                Value::Int(3),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_table(sample_table());
        let twice = normalize_table(once.clone());
        assert_eq!(once, twice);
    }
}
