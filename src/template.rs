//! CSV register template loader.
//!
//! Columns are matched by header name:
//! `address, read_type, data_type, tag_name, scaling_coeff, scaling_offset`.
//! Missing columns and blank cells become `None`; the planner decides what a
//! row without them means.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::ConfigError;
use crate::planner::TemplateRow;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRow {
    address: Option<String>,
    read_type: Option<String>,
    data_type: Option<String>,
    tag_name: Option<String>,
    scaling_coeff: Option<String>,
    scaling_offset: Option<String>,
}

/// Load a template file.
pub fn load_template(path: impl AsRef<Path>) -> Result<Vec<TemplateRow>, ConfigError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_template(file)
}

/// Parse template rows from any CSV source.
pub fn parse_template<R: Read>(reader: R) -> Result<Vec<TemplateRow>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<RawRow>().enumerate() {
        let raw = record?;
        let row_number = index + 1;
        rows.push(TemplateRow {
            address: parse_address(row_number, raw.address.as_deref()),
            read_type: non_blank(raw.read_type),
            data_type: non_blank(raw.data_type),
            tag_name: non_blank(raw.tag_name),
            scaling_coeff: parse_number(row_number, "scaling_coeff", raw.scaling_coeff.as_deref()),
            scaling_offset: parse_number(
                row_number,
                "scaling_offset",
                raw.scaling_offset.as_deref(),
            ),
        });
    }
    Ok(rows)
}

fn non_blank(cell: Option<String>) -> Option<String> {
    cell.filter(|s| !s.trim().is_empty())
}

fn parse_number(row: usize, column: &str, cell: Option<&str>) -> Option<f64> {
    let cell = cell.map(str::trim).filter(|s| !s.is_empty())?;
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            warn!("Template row {}: ignoring {} {:?}", row, column, cell);
            None
        }
    }
}

/// Whole numbers written as floats (`100.0`) are accepted.
fn parse_address(row: usize, cell: Option<&str>) -> Option<u32> {
    let cell = cell.map(str::trim).filter(|s| !s.is_empty())?;
    if let Ok(address) = cell.parse::<u32>() {
        return Some(address);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) => {
            Some(value as u32)
        }
        _ => {
            warn!("Template row {}: ignoring address {:?}", row, cell);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ReadPlan;
    use crate::protocol::ModbusFunction;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_template() {
        let csv = "\
address,read_type,data_type,tag_name,scaling_coeff,scaling_offset
0,coil,coil,pump_on,,
100,HR,float32,flow,0.1,-2
102.0, Holding ,uint16,level,abc,
,HR,uint16,orphan,,
";
        let rows = parse_template(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0], TemplateRow::new(0, "coil", "coil", "pump_on"));
        assert_eq!(
            rows[1],
            TemplateRow::new(100, "HR", "float32", "flow").with_scaling(Some(0.1), Some(-2.0))
        );
        assert_eq!(rows[2].address, Some(102));
        assert_eq!(rows[2].read_type.as_deref(), Some("Holding"));
        assert_eq!(rows[2].scaling_coeff, None);
        assert_eq!(rows[3].address, None);
    }

    #[test]
    fn test_missing_columns_and_short_rows() {
        let csv = "address,read_type,tag_name\n7,IR,temp\n8,IR\n";
        let rows = parse_template(csv.as_bytes()).unwrap();

        assert_eq!(rows[0].data_type, None);
        assert_eq!(rows[0].tag_name.as_deref(), Some("temp"));
        assert_eq!(rows[1].tag_name, None);

        let plan = ReadPlan::compile(&rows);
        assert_eq!(plan.groups(ModbusFunction::ReadInputRegisters).len(), 1);
    }

    #[test]
    fn test_bad_address_is_dropped() {
        let rows = parse_template("address,read_type\n-4,HR\n1.5,HR\n".as_bytes()).unwrap();
        assert!(rows.iter().all(|r| r.address.is_none()));
    }

    #[test]
    fn test_load_template_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "address,read_type,data_type,tag_name").unwrap();
        writeln!(file, "3,DI,di,door").unwrap();

        let rows = load_template(file.path()).unwrap();
        assert_eq!(rows, vec![TemplateRow::new(3, "DI", "di", "door")]);

        let err = load_template("/nonexistent/template.csv").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
