//! Cell and range helpers shared by the sheet clients.

use serde_json::Value as JsonValue;

use crate::normalize::normalize_value;
use crate::warehouse::{Row, Value};

/// Converts one cell into the JSON literal written to the sheet.
///
/// Nulls and non-finite floats become empty strings; bytes become hex
/// text. Values that were not normalized yet are normalized here.
pub fn to_cell(value: &Value) -> JsonValue {
    match normalize_value(value.clone()) {
        Value::Null => JsonValue::from(""),
        Value::Bool(b) => JsonValue::from(b),
        Value::Int(i) => JsonValue::from(i),
        Value::Float(f) if f.is_finite() => JsonValue::from(f),
        Value::Float(_) => JsonValue::from(""),
        other => JsonValue::from(other.to_display_string()),
    }
}

/// Converts data rows into the `values` payload of an update request.
pub fn to_cells(rows: &[Row]) -> Vec<Vec<JsonValue>> {
    rows.iter()
        .map(|row| row.iter().map(to_cell).collect())
        .collect()
}

/// Quotes a tab name for use in A1 notation.
pub fn quote_worksheet(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Builds the A1 range for a tab: the tab origin when `range` is absent.
///
/// A range that already names a tab (contains `!`) is used as given.
pub fn a1_range(worksheet: &str, range: Option<&str>) -> String {
    match range.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) if r.contains('!') => r.to_string(),
        Some(r) => format!("{}!{r}", quote_worksheet(worksheet)),
        None => format!("{}!A1", quote_worksheet(worksheet)),
    }
}

/// Range cleared when no explicit range is given: the whole tab.
pub fn clear_range(worksheet: &str, range: Option<&str>) -> String {
    match range.map(str::trim).filter(|r| !r.is_empty()) {
        Some(_) => a1_range(worksheet, range),
        None => quote_worksheet(worksheet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_to_cell() {
        assert_eq!(to_cell(&Value::Null), json!(""));
        assert_eq!(to_cell(&Value::Bool(true)), json!(true));
        assert_eq!(to_cell(&Value::Int(3)), json!(3));
        assert_eq!(to_cell(&Value::Float(12.5)), json!(12.5));
        assert_eq!(to_cell(&Value::from("x")), json!("x"));
        assert_eq!(to_cell(&Value::Bytes(vec![0xca, 0xfe])), json!("cafe"));
    }

    #[test]
    fn test_non_finite_floats_are_blank() {
        assert_eq!(to_cell(&Value::Float(f64::NAN)), json!(""));
        assert_eq!(to_cell(&Value::Float(f64::INFINITY)), json!(""));
    }

    #[test]
    fn test_unnormalized_values_are_normalized() {
        assert_eq!(
            to_cell(&Value::Decimal(Decimal::from_str("1.25").unwrap())),
            json!(1.25)
        );
        assert_eq!(
            to_cell(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())),
            json!("2024-03-05")
        );
    }

    #[test]
    fn test_to_cells_keeps_shape() {
        let rows = vec![
            vec![Value::Int(1), Value::Null],
            vec![Value::Int(2), Value::from("b")],
        ];
        assert_eq!(to_cells(&rows), vec![vec![json!(1), json!("")], vec![json!(2), json!("b")]]);
    }

    #[test]
    fn test_a1_range() {
        assert_eq!(a1_range("Sales", None), "'Sales'!A1");
        assert_eq!(a1_range("Sales", Some("B2")), "'Sales'!B2");
        assert_eq!(a1_range("Sales", Some("  ")), "'Sales'!A1");
        assert_eq!(a1_range("Sales", Some("Other!C3")), "Other!C3");
        assert_eq!(a1_range("Bob's tab", Some("A1:D9")), "'Bob''s tab'!A1:D9");
    }

    #[test]
    fn test_clear_range() {
        assert_eq!(clear_range("Sales", None), "'Sales'");
        assert_eq!(clear_range("Sales", Some("A2:F")), "'Sales'!A2:F");
    }
}
