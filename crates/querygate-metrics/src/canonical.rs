//! Order-insensitive, type-tolerant canonical form for result rows.
//!
//! Two rows that a reader would call "the same answer" canonicalize to the
//! same string: `2`, `2.0` and `" 2 "` all become `2`, timestamps become UTC
//! millisecond ISO strings, byte strings become base64.

use base64::Engine;
use querygate_core::model::{Cell, Row};
use serde_json::{Map, Number, Value};

const DECIMALS: f64 = 1e8;
/// Beyond this magnitude rounding to 8 places would lose integer precision.
const ROUNDING_LIMIT: f64 = 1e15;

pub fn canonical_cell(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Bool(*b),
        Cell::Int(i) => Value::from(*i),
        Cell::Float(f) => number(*f),
        Cell::Text(s) => {
            let trimmed = s.trim();
            if is_numeric_literal(trimmed) {
                trimmed
                    .parse::<f64>()
                    .map(number)
                    .unwrap_or_else(|_| Value::String(trimmed.to_string()))
            } else {
                Value::String(trimmed.to_string())
            }
        }
        Cell::Date(d) => Value::String(format!("{}T00:00:00.000Z", d.format("%Y-%m-%d"))),
        Cell::Timestamp(ts) => Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
        Cell::Bytes(b) => Value::String(base64::engine::general_purpose::STANDARD.encode(b)),
        Cell::List(items) => Value::Array(items.iter().map(canonical_cell).collect()),
        Cell::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), canonical_cell(&map[k]));
            }
            Value::Object(out)
        }
    }
}

/// Canonical JSON text of one row.
pub fn canonical_row(row: &Row) -> String {
    Value::Array(row.iter().map(canonical_cell).collect()).to_string()
}

/// Canonical rows, sorted, so row order never matters.
pub fn canonical_rows(rows: &[Row]) -> Vec<String> {
    let mut out: Vec<String> = rows.iter().map(canonical_row).collect();
    out.sort();
    out
}

/// First column of the first row, canonicalized; `Null` when there is none.
pub fn first_scalar(rows: &[Row]) -> Value {
    rows.first()
        .and_then(|r| r.first())
        .map(canonical_cell)
        .unwrap_or(Value::Null)
}

fn number(f: f64) -> Value {
    if !f.is_finite() {
        return Value::Null;
    }
    let rounded = if f.abs() < ROUNDING_LIMIT {
        (f * DECIMALS).round() / DECIMALS
    } else {
        f
    };
    if rounded.fract() == 0.0 && rounded.abs() < ROUNDING_LIMIT {
        return Value::from(rounded as i64);
    }
    Number::from_f64(rounded)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// `-?\d+(\.\d+)?`
fn is_numeric_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (digits, None),
    };
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && frac.map_or(true, all_digits)
}
