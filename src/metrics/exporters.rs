use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;
use csv::Writer;

use super::collector::EventRecord;
use super::reduce::{ClassTotals, SimulationSummary};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn export_json<P: AsRef<Path>>(path: P, summary: &SimulationSummary) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}

fn write_class<W: Write>(writer: &mut Writer<W>, prefix: &str, totals: &ClassTotals) -> Result<()> {
    writer.write_record(&[format!("{prefix}_vehicles"), totals.vehicles.to_string()])?;
    writer.write_record(&[format!("{prefix}_sent"), totals.sent.to_string()])?;
    writer.write_record(&[format!("{prefix}_received"), totals.received.to_string()])?;
    writer.write_record(&[format!("{prefix}_dropped"), totals.dropped.to_string()])?;
    writer.write_record(&[format!("{prefix}_revoked"), totals.revoked.to_string()])?;
    writer.write_record(&[
        format!("{prefix}_communication_errors"),
        totals.communication_errors.to_string(),
    ])?;
    Ok(())
}

/// Writes `metric,value` rows followed by one `vehicle.<key>.<field>` row per
/// counter of every vehicle.
pub fn export_csv<P: AsRef<Path>>(path: P, summary: &SimulationSummary) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let file = File::create(path)?;
    let mut writer = Writer::from_writer(file);

    writer.write_record(["metric", "value"])?;
    writer.write_record(["variant", summary.variant.as_str()])?;
    writer.write_record(&["ticks".to_string(), summary.ticks.to_string()])?;
    writer.write_record(&[
        "simulated_ms".to_string(),
        format!("{:.3}", summary.simulated_ms),
    ])?;
    writer.write_record(&[
        "stopped_early".to_string(),
        summary.stopped_early.to_string(),
    ])?;

    write_class(&mut writer, "malicious", &summary.malicious)?;
    write_class(&mut writer, "legitimate", &summary.legitimate)?;

    writer.write_record(["rsu_policy", summary.rsu.policy.as_str()])?;
    writer.write_record(&[
        "rsu_operational".to_string(),
        summary.rsu.operational.to_string(),
    ])?;
    writer.write_record(&[
        "rsu_accepted_malicious".to_string(),
        summary.rsu.accepted_malicious.to_string(),
    ])?;
    writer.write_record(&[
        "rsu_accepted_legitimate".to_string(),
        summary.rsu.accepted_legitimate.to_string(),
    ])?;
    if let Some(count) = summary.rsu.message_count {
        writer.write_record(&["rsu_message_count".to_string(), count.to_string()])?;
    }
    if let Some(at) = summary.rsu.inoperable_at_ms {
        writer.write_record(&["rsu_inoperable_at_ms".to_string(), format!("{at:.3}")])?;
    }
    writer.write_record(&[
        "revocations".to_string(),
        summary.revocations.len().to_string(),
    ])?;

    if let Some(usage) = &summary.resource_usage {
        writer.write_record(&[
            "cpu_time_secs".to_string(),
            format!("{:.3}", usage.cpu_time_secs),
        ])?;
        writer.write_record(&[
            "wall_time_secs".to_string(),
            format!("{:.3}", usage.wall_time_secs),
        ])?;
        writer.write_record(&[
            "max_rss_bytes".to_string(),
            usage.max_rss_bytes.to_string(),
        ])?;
    }

    for vehicle in &summary.vehicles {
        let key = &vehicle.key;
        writer.write_record(&[format!("vehicle.{key}.sent"), vehicle.sent.to_string()])?;
        writer.write_record(&[
            format!("vehicle.{key}.received"),
            vehicle.received.to_string(),
        ])?;
        writer.write_record(&[
            format!("vehicle.{key}.dropped"),
            vehicle.dropped.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes one JSON object per line.
pub fn export_events<P: AsRef<Path>>(path: P, events: &[EventRecord]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;

    let mut out = BufWriter::new(File::create(path)?);
    for event in events {
        serde_json::to_writer(&mut out, event)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
