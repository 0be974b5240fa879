use serde_json::Value;
use std::io::{self, Read};

/// Read a piped request from stdin.
///
/// Returns `None` when stdin is a terminal or the pipe is empty. JSON is
/// tried first; anything else is parsed as YAML so the same deal files work
/// with `--input` and with `cat deal.yaml | capstack calculate`.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped(buffer: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(Some(value)),
        Err(json_err) => {
            tracing::debug!(error = %json_err, "stdin is not JSON, trying YAML");
            let value: Value = serde_yaml::from_str(trimmed)
                .map_err(|e| format!("stdin is neither JSON ({json_err}) nor YAML ({e})"))?;
            Ok(Some(value))
        }
    }
}
