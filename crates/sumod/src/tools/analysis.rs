//! FCD output analysis.
//!
//! A line-oriented scan rather than a full XML parse: FCD exports can reach
//! hundreds of megabytes, and the attributes of interest sit one vehicle
//! sample per line in the format SUMO writes.

use std::collections::HashSet;
use std::path::Path;

/// Summarize a floating-car-data export: timestep count, fleet size, and
/// speed statistics.
pub fn analyze_fcd(fcd_file: &Path) -> String {
    if !fcd_file.exists() {
        return format!("Error: FCD file not found at {}", fcd_file.display());
    }

    let body = match std::fs::read_to_string(fcd_file) {
        Ok(body) => body,
        Err(err) => {
            return format!("Error reading FCD file {}: {err}", fcd_file.display());
        }
    };

    let mut timesteps = 0usize;
    let mut vehicle_ids: HashSet<String> = HashSet::new();
    let mut samples = 0usize;
    let mut speed_sum = 0.0f64;
    let mut max_speed = 0.0f64;

    for line in body.lines() {
        if line.contains("<timestep") {
            timesteps += 1;
            continue;
        }
        if !line.contains("<vehicle") {
            continue;
        }
        samples += 1;
        if let Some(id) = attr_value(line, "id") {
            vehicle_ids.insert(id.to_string());
        }
        if let Some(speed) = attr_value(line, "speed").and_then(|raw| raw.parse::<f64>().ok()) {
            speed_sum += speed;
            if speed > max_speed {
                max_speed = speed;
            }
        }
    }

    let name = fcd_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| fcd_file.display().to_string());

    if timesteps == 0 {
        return format!(
            "FCD Analysis of {name}:\nNo timesteps found. The simulation may not have produced any FCD output."
        );
    }

    let avg_speed = if samples > 0 {
        speed_sum / samples as f64
    } else {
        0.0
    };

    format!(
        "FCD Analysis of {name}:\n- Timesteps: {timesteps}\n- Unique vehicles: {}\n- Vehicle samples: {samples}\n- Average speed: {avg_speed:.2} m/s\n- Max speed: {max_speed:.2} m/s",
        vehicle_ids.len()
    )
}

/// Value of ` key="..."` on an XML line. The leading space keeps `id` from
/// matching inside longer attribute names.
fn attr_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!(" {key}=\"");
    let start = line.find(&marker)? + marker.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(&rest[..end])
}
