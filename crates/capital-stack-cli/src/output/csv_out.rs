use serde_json::{Map, Value};
use std::io;

/// Write output as CSV to stdout.
///
/// Scalar result fields come first as `field,value` rows, nested objects
/// flattened to `parent.child`. Each array of row objects (tranches,
/// projections, schedule years, scenario results) follows as its own
/// section: a blank line, a `# name` marker, then a header and one record
/// per row.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(stdout.lock());

    let body = match value {
        Value::Object(map) => map.get("result").unwrap_or(value),
        _ => value,
    };

    match body {
        Value::Object(result) => write_result(&mut wtr, result),
        Value::Array(arr) => write_rows(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(body)]);
        }
    }

    let _ = wtr.flush();
}

fn write_result<W: io::Write>(wtr: &mut csv::Writer<W>, result: &Map<String, Value>) {
    let mut row_sets: Vec<(&String, &Vec<Value>)> = Vec::new();

    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in result {
        match val {
            Value::Array(rows) if rows.first().is_some_and(Value::is_object) => {
                row_sets.push((key, rows));
            }
            Value::Object(inner) => {
                for (sub_key, sub_val) in inner {
                    let _ = wtr.write_record([
                        format!("{}.{}", key, sub_key),
                        format_csv_value(sub_val),
                    ]);
                }
            }
            _ => {
                let _ = wtr.write_record([key.clone(), format_csv_value(val)]);
            }
        }
    }

    for (key, rows) in row_sets {
        let _ = wtr.write_record([""]);
        let _ = wtr.write_record([format!("# {}", key)]);
        write_rows(wtr, rows);
    }
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // Sensitivity matrix rows and grid positions
        Value::Array(items) => items
            .iter()
            .map(format_csv_value)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
