use crate::controller::FrameRow;
use anyhow::Result;
use csv::WriterBuilder;
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Prefix text cells that a spreadsheet would evaluate as a formula.
fn guard_cell(s: &str) -> Cow<'_, str> {
    match s.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => Cow::Owned(format!("'{s}")),
        _ => Cow::Borrowed(s),
    }
}

/// Save a frame as CSV with header. Missing values are written as empty cells.
pub fn save_frame_csv<P: AsRef<Path>>(rows: &[FrameRow], path: P) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.serialize(("layer", "feature_id", "year", "timestamp", "average", "fill_color", "selected"))?;
    for r in rows {
        wtr.serialize((
            guard_cell(&r.layer),
            guard_cell(&r.feature_id),
            guard_cell(&r.year),
            guard_cell(&r.timestamp),
            r.average,
            &r.fill_color,
            r.selected,
        ))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save a frame as a pretty JSON array.
pub fn save_frame_json<P: AsRef<Path>>(rows: &[FrameRow], path: P) -> Result<()> {
    let mut f = File::create(path)?;
    let s = serde_json::to_string_pretty(rows)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}
