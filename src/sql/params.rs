//! Bind values for MySQL statements, converted from request strings and JSON.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::mysql::{MySql, MySqlTypeInfo};
use sqlx::{Database, Type};
use std::fmt;

/// A value bound to a `?` placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Render a float as JS `Number#toString` does: shortest round-trip digits, plain
/// notation for exponents in [-7, 21), `d.ddde+N` / `d.ddde-N` outside it, and `0` for `-0`.
fn canonical_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    // `{:e}` gives the shortest digits, e.g. `1.5e-7`.
    let sci = format!("{:e}", f.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exp.parse::<i32>().unwrap_or(0) + 1;
    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        format!("{}.{}", &digits[..n as usize], &digits[n as usize..])
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let sign = if n - 1 >= 0 { '+' } else { '-' };
        let frac = if k > 1 { format!(".{}", &digits[1..]) } else { String::new() };
        format!("{}{}e{}{}", &digits[..1], frac, sign, (n - 1).abs())
    };
    if f < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

impl SqlValue {
    /// Canonical numeric strings become numbers; everything else stays text.
    /// `"42"` and `"1.5"` are numeric, `"007"`, `"1.50"`, `"1e3"` and `"12abc"` are not.
    pub fn coerce(s: &str) -> Self {
        let Ok(f) = s.parse::<f64>() else {
            return SqlValue::Text(s.to_string());
        };
        if !f.is_finite() || canonical_float(f) != s {
            return SqlValue::Text(s.to_string());
        }
        match s.parse::<i64>() {
            Ok(i) => SqlValue::Int(i),
            Err(_) => SqlValue::Float(f),
        }
    }

    /// Convert a body value. Objects and arrays are stored as JSON text; strings go
    /// through [`SqlValue::coerce`] only when `coerce_strings` is set.
    pub fn from_json(v: &Value, coerce_strings: bool) -> Self {
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::Float(f)
                } else {
                    SqlValue::Text(n.to_string())
                }
            }
            Value::String(s) if coerce_strings => SqlValue::coerce(s),
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlValue::Text(v.to_string()),
        }
    }

    /// JSON form used when echoing an id back to the client.
    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::Number((*i).into()),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s.clone()),
        }
    }

    /// Escaped SQL literal: numbers bare, text single-quoted with MySQL escapes.
    /// Only used to render statements for logs; execution always binds.
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(true) => "true".to_string(),
            SqlValue::Bool(false) => "false".to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => canonical_float(*f),
            SqlValue::Text(s) => escape_string(s),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

impl<'q> Encode<'q, MySql> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <MySql as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            SqlValue::Null => <Option<i64> as Encode<MySql>>::encode_by_ref(&None, buf)?,
            SqlValue::Bool(b) => <bool as Encode<MySql>>::encode_by_ref(b, buf)?,
            SqlValue::Int(n) => <i64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            SqlValue::Float(n) => <f64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            SqlValue::Text(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<MySql>>::encode_by_ref(&s_ref, buf)?
            }
        })
    }

    fn produces(&self) -> Option<MySqlTypeInfo> {
        Some(match self {
            SqlValue::Null | SqlValue::Int(_) => <i64 as Type<MySql>>::type_info(),
            SqlValue::Bool(_) => <bool as Type<MySql>>::type_info(),
            SqlValue::Float(_) => <f64 as Type<MySql>>::type_info(),
            SqlValue::Text(_) => <str as Type<MySql>>::type_info(),
        })
    }
}

impl Type<MySql> for SqlValue {
    fn type_info() -> MySqlTypeInfo {
        <str as Type<MySql>>::type_info()
    }
}
