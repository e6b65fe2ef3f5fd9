use crate::model::{CanonicalProperty, ExportError, RawDetailRecord};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Pretty-printed JSON array; nested structures are kept as-is.
pub fn to_json<T: Serialize>(records: &[T]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Flat CSV. The header is the sorted union of keys present in any record;
/// keys holding arrays or objects in any record are left out.
pub fn to_csv<T: Serialize>(records: &[T]) -> Result<String, ExportError> {
    let rows = records
        .iter()
        .map(|r| -> Result<Map<String, Value>, ExportError> {
            match serde_json::to_value(r)? {
                Value::Object(map) => Ok(map),
                _ => Ok(Map::new()),
            }
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    let mut nested = BTreeSet::new();
    let mut header = BTreeSet::new();
    for row in &rows {
        for (key, value) in row {
            match value {
                Value::Array(_) | Value::Object(_) => {
                    nested.insert(key.as_str());
                }
                Value::Null => {}
                _ => {
                    header.insert(key.as_str());
                }
            }
        }
    }
    let header: Vec<&str> = header.difference(&nested).copied().collect();
    if header.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(&header)?;
    for row in &rows {
        writer.write_record(header.iter().map(|key| cell(row.get(*key))))?;
    }
    let bytes = writer.into_inner().map_err(|e| ExportError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ExportError::Csv(e.to_string()))
}

fn cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Writes `<stem>_properties.{csv,json}` (raw records) and
/// `<stem>_canonical.{csv,json}` into `dir`, creating it if needed.
pub fn save_outputs(
    dir: &Path,
    stem: &str,
    raw: &[RawDetailRecord],
    canonical: &[CanonicalProperty],
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir)?;
    let files = [
        (format!("{}_properties.csv", stem), to_csv(raw)?),
        (format!("{}_properties.json", stem), to_json(raw)?),
        (format!("{}_canonical.csv", stem), to_csv(canonical)?),
        (format!("{}_canonical.json", stem), to_json(canonical)?),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = dir.join(name);
        fs::write(&path, content)?;
        info!("Saved {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Portal, RawListingRecord};

    fn sample() -> Vec<RawDetailRecord> {
        let mut a = RawListingRecord::new(Portal::Rightmove, "https://www.rightmove.co.uk/properties/1");
        a.price = Some("250000".into());
        let mut first = RawDetailRecord::from(a);
        first.features = vec!["Garden".into()];

        let mut b = RawListingRecord::new(Portal::Rightmove, "https://www.rightmove.co.uk/properties/2");
        b.address = Some("2 Mill Lane, Leeds".into());
        let second = RawDetailRecord::from(b);
        vec![first, second]
    }

    #[test]
    fn test_csv_header_is_sorted_union_without_nested() {
        let csv = to_csv(&sample()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("address,portal,price,url"));
        assert_eq!(lines.next(), Some(",rightmove,250000,https://www.rightmove.co.uk/properties/1"));
        assert_eq!(
            lines.next(),
            Some("\"2 Mill Lane, Leeds\",rightmove,,https://www.rightmove.co.uk/properties/2")
        );
    }

    #[test]
    fn test_json_keeps_nested_values() {
        let json = to_json(&sample()).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["features"][0], "Garden");
        assert!(json.contains("\n  "));
    }

    #[test]
    fn test_save_outputs_writes_four_files() {
        let dir = std::env::temp_dir().join(format!("estate-sniper-export-{}", std::process::id()));
        let written = save_outputs(&dir, "rightmove_leeds", &sample(), &[]).unwrap();
        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|p| p.exists()));
        let canonical = fs::read_to_string(dir.join("rightmove_leeds_canonical.json")).unwrap();
        assert_eq!(canonical.trim(), "[]");
        fs::remove_dir_all(&dir).unwrap();
    }
}
