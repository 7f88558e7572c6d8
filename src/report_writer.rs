//! JSON output at the system edge
//!
//! Core results keep raw floats. Converting through `serde_json::Value`
//! turns NaN and infinities into `null`, so emitted documents are always
//! valid JSON.

use crate::errors::{ScreenError, ScreenResult};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub fn to_json_value<T: Serialize>(value: &T) -> ScreenResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ScreenError::serialization("encode report", e))
}

pub fn to_json_string<T: Serialize>(value: &T) -> ScreenResult<String> {
    let sanitized = to_json_value(value)?;
    serde_json::to_string_pretty(&sanitized).map_err(|e| ScreenError::serialization("render report", e))
}

/// Write pretty JSON to `output`, or to stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> ScreenResult<()> {
    let rendered = to_json_string(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ScreenError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(path, rendered + "\n")
                .map_err(|e| ScreenError::io(format!("write {}", path.display()), e))?;
            info!("Wrote report to {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{rendered}").map_err(|e| ScreenError::io("write stdout", e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        finite: f64,
        nan: f64,
        inf: f64,
        nested: Vec<f64>,
    }

    fn sample() -> Sample {
        Sample {
            finite: 1.5,
            nan: f64::NAN,
            inf: f64::INFINITY,
            nested: vec![f64::NEG_INFINITY, 2.0],
        }
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        let value = to_json_value(&sample()).unwrap();
        assert_eq!(value["finite"], 1.5);
        assert!(value["nan"].is_null());
        assert!(value["inf"].is_null());
        assert!(value["nested"][0].is_null());
        assert_eq!(value["nested"][1], 2.0);
    }

    #[test]
    fn test_write_to_file_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        write_json(&sample(), Some(&path)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(parsed["nan"].is_null());
    }
}
