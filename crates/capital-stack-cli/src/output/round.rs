use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{Number, Value};

/// Round every decimal value in the output to `dp` places.
///
/// Decimals arrive as strings; strings that do not parse as a number
/// (labels, warnings, the version) are left alone. Float values from the
/// Monte Carlo summary are rounded the same way. Integers are untouched.
pub fn round_decimals(value: &mut Value, dp: u32) {
    match value {
        Value::String(s) => {
            if let Ok(d) = s.parse::<Decimal>() {
                *s = d.round_dp(dp).normalize().to_string();
            }
        }
        Value::Number(n) if n.is_f64() => {
            let rounded = n
                .as_f64()
                .and_then(Decimal::from_f64)
                .map(|d| d.round_dp(dp))
                .and_then(|d| d.to_f64())
                .and_then(Number::from_f64);
            if let Some(r) = rounded {
                *n = r;
            }
        }
        Value::Array(items) => {
            for item in items {
                round_decimals(item, dp);
            }
        }
        Value::Object(map) => {
            // Timing and version metadata are reported as-is
            for (key, item) in map.iter_mut() {
                if key != "metadata" {
                    round_decimals(item, dp);
                }
            }
        }
        _ => {}
    }
}
