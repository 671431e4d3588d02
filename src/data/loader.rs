use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use encoding_rs::SHIFT_JIS;
use serde::{Deserialize, Serialize};

use super::error::{ExtractError, RowFault};
use super::model::{Column, Table};

/// First field of the real header row in a vendor export.
pub const HEADER_MARKER: &str = "TIME";

// ---------------------------------------------------------------------------
// Layout – how to find the header and the first data row
// ---------------------------------------------------------------------------

/// Where the header row and the data rows live in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layout {
    /// Search for the first line starting with `token`; data follows directly.
    Marker {
        #[serde(default = "default_marker")]
        token: String,
    },
    /// Caller-known 1-based line numbers; lines in between are ignored.
    Fixed {
        header_line: usize,
        data_start_line: usize,
    },
}

fn default_marker() -> String {
    HEADER_MARKER.to_string()
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Marker {
            token: default_marker(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Read a capture from disk and extract its table.
pub fn load_file(path: &Path, layout: &Layout) -> Result<Table> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let table = extract_with(&raw, layout)
        .with_context(|| format!("extracting table from {}", path.display()))?;
    Ok(table)
}

/// Extract a table by searching for the [`HEADER_MARKER`] row.
pub fn extract(raw: &[u8]) -> Result<Table, ExtractError> {
    extract_with(raw, &Layout::default())
}

/// Extract a table using the header and data positions given by `layout`.
pub fn extract_with(raw: &[u8], layout: &Layout) -> Result<Table, ExtractError> {
    match layout {
        Layout::Marker { token } => {
            let text = decode(raw)?;
            let lines: Vec<&str> = text.lines().collect();
            let header = locate_header_with(&lines, token)?;
            parse_table(raw, header)
        }
        Layout::Fixed {
            header_line,
            data_start_line,
        } => parse_table_fixed(raw, *header_line, *data_start_line),
    }
}

/// Decode vendor bytes as Shift-JIS, failing on any invalid sequence.
pub fn decode(raw: &[u8]) -> Result<String, ExtractError> {
    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(Cow::into_owned)
        .ok_or(ExtractError::Decode)
}

// ---------------------------------------------------------------------------
// Header discovery
// ---------------------------------------------------------------------------

/// Index of the first line starting with [`HEADER_MARKER`].
pub fn locate_header<S: AsRef<str>>(lines: &[S]) -> Result<usize, ExtractError> {
    locate_header_with(lines, HEADER_MARKER)
}

/// Index of the first line starting with `marker`.
pub fn locate_header_with<S: AsRef<str>>(lines: &[S], marker: &str) -> Result<usize, ExtractError> {
    let index = lines
        .iter()
        .position(|line| line.as_ref().starts_with(marker))
        .ok_or_else(|| ExtractError::HeaderNotFound {
            marker: marker.to_string(),
        })?;
    log::info!("Header row is line {}", index + 1);
    Ok(index)
}

// ---------------------------------------------------------------------------
// Table parsing
// ---------------------------------------------------------------------------

/// Parse `raw` with the header at 0-based line `header_index` and data
/// starting on the line right after it.
pub fn parse_table(raw: &[u8], header_index: usize) -> Result<Table, ExtractError> {
    let text = decode(raw)?;
    let lines: Vec<&str> = text.lines().collect();
    if header_index >= lines.len() {
        return Err(ExtractError::InvalidLayout(format!(
            "header index {header_index} is past the end of a {}-line document",
            lines.len()
        )));
    }
    read_table(&lines, header_index, header_index + 1)
}

/// Parse `raw` with a header and first data row at known 1-based line numbers.
pub fn parse_table_fixed(
    raw: &[u8],
    header_line: usize,
    data_start_line: usize,
) -> Result<Table, ExtractError> {
    if header_line == 0 {
        return Err(ExtractError::InvalidLayout(
            "line numbers are 1-based".to_string(),
        ));
    }
    if data_start_line <= header_line {
        return Err(ExtractError::InvalidLayout(format!(
            "data start line {data_start_line} must come after header line {header_line}"
        )));
    }

    let text = decode(raw)?;
    let lines: Vec<&str> = text.lines().collect();
    if header_line > lines.len() {
        return Err(ExtractError::InvalidLayout(format!(
            "header line {header_line} is past the end of a {}-line document",
            lines.len()
        )));
    }
    read_table(&lines, header_line - 1, data_start_line - 1)
}

/// Shared body of both layouts. `header` and `data_start` are 0-based.
fn read_table(lines: &[&str], header: usize, data_start: usize) -> Result<Table, ExtractError> {
    let header_record = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .from_reader(lines[header].as_bytes())
        .records()
        .next()
        .transpose()?
        .ok_or_else(|| {
            ExtractError::InvalidLayout(format!("header line {} is empty", header + 1))
        })?;
    let names = unique_names(header_record.iter().map(str::to_string));

    // Blank and whitespace-only lines are skipped; keep 1-based file line
    // numbers of the rest so errors point at the right place.
    let (line_numbers, data_lines): (Vec<usize>, Vec<&str>) = lines
        .iter()
        .enumerate()
        .skip(data_start)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, *line))
        .unzip();
    let body = data_lines.join("\n");
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let line = line_numbers.get(row).copied().unwrap_or(data_start + row + 1);
        push_row(&record, &names, &mut values).map_err(|fault| ExtractError::MalformedRow {
            row,
            line,
            fault,
        })?;
    }

    let table = Table::new(
        names
            .into_iter()
            .zip(values)
            .map(|(name, vals)| Column::new(name, vals))
            .collect(),
    )?;

    log::debug!(
        "Parsed {} rows with columns {:?}",
        table.len(),
        table.column_names()
    );
    if log::log_enabled!(log::Level::Debug) {
        for i in 0..table.len().min(5) {
            log::debug!("  {:?}", table.row(i).unwrap_or_default());
        }
    }
    Ok(table)
}

fn push_row(record: &StringRecord, names: &[String], values: &mut [Vec<f64>]) -> Result<(), RowFault> {
    if record.len() != names.len() {
        return Err(RowFault::FieldCount {
            expected: names.len(),
            found: record.len(),
        });
    }
    // Parse the whole row before pushing so a failure leaves no partial row.
    let parsed: Vec<f64> = record
        .iter()
        .zip(names)
        .map(|(field, name)| {
            parse_value(field).ok_or_else(|| RowFault::NotNumeric {
                column: name.clone(),
                value: field.to_string(),
            })
        })
        .collect::<Result<_, _>>()?;
    for (col, v) in values.iter_mut().zip(parsed) {
        col.push(v);
    }
    Ok(())
}

/// Empty fields are missing samples and read as NaN.
fn parse_value(field: &str) -> Option<f64> {
    if field.is_empty() {
        return Some(f64::NAN);
    }
    field.parse::<f64>().ok()
}

/// Repeated names get `.1`, `.2`, … suffixes in order of appearance.
fn unique_names(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut taken = BTreeSet::new();
    let mut out = Vec::new();
    for name in raw {
        let mut candidate = name.clone();
        let mut n = 0;
        while taken.contains(&candidate) {
            n += 1;
            candidate = format!("{name}.{n}");
        }
        taken.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

/// Encode a table as comma-separated text: one header row, then data rows.
/// NaN is written as an empty field.
pub fn write_csv(table: &Table) -> Result<String, ExtractError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.column_names())?;
    for i in 0..table.len() {
        let row = table.row(i).unwrap_or_default();
        writer.write_record(row.iter().map(|v| {
            if v.is_nan() {
                String::new()
            } else {
                v.to_string()
            }
        }))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE: &str = "META,1\nMETA,2\nTIME,CH1,CH2,CH3,CH4\n0.0,1,2,3,4\n0.1,5,6,7,8\n";

    fn sjis(text: &str) -> Vec<u8> {
        SHIFT_JIS.encode(text).0.into_owned()
    }

    #[test]
    fn locate_header_finds_first_marker_line() {
        let lines = ["Model,TDS2024C", "TIME,CH1", "0.0,1", "TIME,CH2"];
        assert_eq!(locate_header(&lines).unwrap(), 1);
    }

    #[test]
    fn locate_header_without_marker_fails() {
        let lines = ["Model,TDS2024C", "Record Length,2500", "0.0,1"];
        let err = locate_header(&lines).unwrap_err();
        assert!(matches!(err, ExtractError::HeaderNotFound { marker } if marker == "TIME"));
        assert!(matches!(
            locate_header::<&str>(&[]),
            Err(ExtractError::HeaderNotFound { .. })
        ));
    }

    #[test]
    fn worked_example() {
        let lines: Vec<&str> = EXAMPLE.lines().collect();
        let header = locate_header(&lines).unwrap();
        assert_eq!(header, 2);

        let table = parse_table(EXAMPLE.as_bytes(), header).unwrap();
        assert_eq!(table.column_names(), ["TIME", "CH1", "CH2", "CH3", "CH4"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("CH2").unwrap().values, vec![2.0, 6.0]);
        assert_eq!(table.time().unwrap().values, vec![0.0, 0.1]);
    }

    #[test]
    fn malformed_row_reports_position() {
        let doc = format!("{EXAMPLE}0.2,x,6,7,8\n");
        let err = extract(doc.as_bytes()).unwrap_err();
        match err {
            ExtractError::MalformedRow { row, line, fault } => {
                assert_eq!(row, 2);
                assert_eq!(line, 6);
                assert_eq!(
                    fault,
                    RowFault::NotNumeric {
                        column: "CH1".to_string(),
                        value: "x".to_string()
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn ragged_row_is_malformed() {
        let doc = "TIME,CH1,CH2\n0.0,1,2\n0.1,3\n";
        let err = extract(doc.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MalformedRow {
                row: 1,
                line: 3,
                fault: RowFault::FieldCount { expected: 3, found: 2 }
            }
        ));
    }

    #[test]
    fn column_count_and_lengths_match_input() {
        for (channels, rows) in [(0, 3), (1, 0), (2, 1), (4, 25)] {
            let mut doc = String::from("Source,scope\n");
            let names: Vec<String> = std::iter::once("TIME".to_string())
                .chain((1..=channels).map(|c| format!("CH{c}")))
                .collect();
            doc.push_str(&names.join(","));
            doc.push('\n');
            for r in 0..rows {
                let fields: Vec<String> = (0..=channels).map(|c| (r * 10 + c).to_string()).collect();
                doc.push_str(&fields.join(","));
                doc.push('\n');
            }

            let table = extract(doc.as_bytes()).unwrap();
            assert_eq!(table.columns().len(), channels + 1);
            assert_eq!(table.channels().len(), channels);
            assert!(table.columns().iter().all(|c| c.values.len() == rows));
        }
    }

    #[test]
    fn round_trip_through_writer() {
        let doc = "junk\nTIME,CH1,CH2\n-0.001,0.04,1e-3\n0,0.08,-2.5\n0.001,0.12,3.75\n";
        let table = extract(doc.as_bytes()).unwrap();
        let text = write_csv(&table).unwrap();
        assert!(text.starts_with("TIME,CH1,CH2\n"));

        let again = extract(text.as_bytes()).unwrap();
        assert_eq!(again.column_names(), table.column_names());
        for (a, b) in again.columns().iter().zip(table.columns()) {
            for (x, y) in a.values.iter().zip(&b.values) {
                assert!((x - y).abs() < 1e-12, "{x} != {y}");
            }
        }
    }

    #[test]
    fn fixed_offsets_skip_line_between_header_and_data() {
        let mut doc = String::new();
        for i in 1..=13 {
            doc.push_str(&format!("設定{i},値{i}\n"));
        }
        doc.push_str("TIME,CH1,CH2\n"); // line 14
        doc.push_str("単位,V,V\n"); // line 15
        doc.push_str("0.0,1,2\n0.1,3,4\n0.2,5,6\n"); // lines 16..
        let raw = sjis(&doc);

        let table = parse_table_fixed(&raw, 14, 16).unwrap();
        assert_eq!(table.column_names(), ["TIME", "CH1", "CH2"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.column("CH1").unwrap().values, vec![1.0, 3.0, 5.0]);

        // Searching for the marker instead treats the units line as data.
        assert!(matches!(
            extract(&raw),
            Err(ExtractError::MalformedRow { row: 0, line: 15, .. })
        ));
    }

    #[test]
    fn fixed_layout_validates_line_numbers() {
        let raw = EXAMPLE.as_bytes();
        assert!(matches!(
            parse_table_fixed(raw, 0, 2),
            Err(ExtractError::InvalidLayout(_))
        ));
        assert!(matches!(
            parse_table_fixed(raw, 3, 3),
            Err(ExtractError::InvalidLayout(_))
        ));
        assert!(matches!(
            parse_table_fixed(raw, 40, 41),
            Err(ExtractError::InvalidLayout(_))
        ));
        // Data start past the end just means no rows.
        assert_eq!(parse_table_fixed(raw, 3, 40).unwrap().len(), 0);
    }

    #[test]
    fn extract_with_dispatches_on_layout() {
        let fixed = Layout::Fixed {
            header_line: 3,
            data_start_line: 5,
        };
        assert_eq!(extract_with(EXAMPLE.as_bytes(), &fixed).unwrap().len(), 1);

        let custom = Layout::Marker {
            token: "META".to_string(),
        };
        // "META,1" becomes the header and "META,2" a non-numeric row.
        assert!(matches!(
            extract_with(EXAMPLE.as_bytes(), &custom),
            Err(ExtractError::MalformedRow { row: 0, .. })
        ));
    }

    #[test]
    fn shift_jis_preamble_is_decoded() {
        let doc = "機種,オシロスコープ\n垂直単位,V\nTIME,CH1\n0.5,1.5\n";
        let raw = sjis(doc);
        assert!(std::str::from_utf8(&raw).is_err());

        let table = extract(&raw).unwrap();
        assert_eq!(table.column("CH1").unwrap().values, vec![1.5]);
        assert!(decode(&raw).unwrap().starts_with("機種"));
    }

    #[test]
    fn invalid_bytes_are_decode_errors() {
        let raw = b"TIME,CH1\n0.0,\xFF\n";
        assert!(matches!(extract(raw), Err(ExtractError::Decode)));
        assert!(matches!(parse_table(raw, 0), Err(ExtractError::Decode)));
    }

    #[test]
    fn duplicate_headers_are_suffixed() {
        let table = extract(b"TIME,CH1,CH1,CH1\n0,1,2,3\n").unwrap();
        assert_eq!(table.column_names(), ["TIME", "CH1", "CH1.1", "CH1.2"]);
    }

    #[test]
    fn empty_fields_are_nan_and_blank_lines_skipped() {
        let doc = "TIME, CH1 ,CH2\r\n0.0, ,2\r\n\r\n0.1,3,\r\n";
        let table = extract(doc.as_bytes()).unwrap();
        assert_eq!(table.column_names(), ["TIME", "CH1", "CH2"]);
        assert_eq!(table.len(), 2);
        assert!(table.column("CH1").unwrap().values[0].is_nan());
        assert!(table.column("CH2").unwrap().values[1].is_nan());
        assert_eq!(table.column("CH1").unwrap().values[1], 3.0);
    }

    #[test]
    fn malformed_row_after_blank_lines_reports_file_line() {
        let err = extract(b"TIME,CH1\n0,1\n\n\n0.2,x\n").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MalformedRow { row: 1, line: 5, .. }
        ));

        let raw = sjis("機種,X\nTIME,CH1\n単位,V\n\n0,1\n  \n0.1,?\n");
        assert!(matches!(
            parse_table_fixed(&raw, 2, 4),
            Err(ExtractError::MalformedRow { row: 1, line: 7, .. })
        ));
    }

    #[test]
    fn whitespace_only_lines_are_skipped() {
        let table = extract(b"TIME,CH1\n0,1\n   \n\t\n1,2\n  \n").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("CH1").unwrap().values, vec![1.0, 2.0]);
    }

    #[test]
    fn parse_table_rejects_index_past_end() {
        assert!(matches!(
            parse_table(EXAMPLE.as_bytes(), 99),
            Err(ExtractError::InvalidLayout(_))
        ));
    }

    #[test]
    fn load_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&sjis(EXAMPLE)).unwrap();

        let table = load_file(file.path(), &Layout::default()).unwrap();
        assert_eq!(table.len(), 2);

        let missing = load_file(Path::new("/nonexistent/capture.csv"), &Layout::default());
        assert!(missing.is_err());
    }

    #[test]
    fn layout_deserializes_from_tagged_json() {
        let fixed: Layout =
            serde_json::from_str(r#"{"kind":"fixed","header_line":14,"data_start_line":16}"#).unwrap();
        assert_eq!(
            fixed,
            Layout::Fixed {
                header_line: 14,
                data_start_line: 16
            }
        );
        let marker: Layout = serde_json::from_str(r#"{"kind":"marker"}"#).unwrap();
        assert_eq!(marker, Layout::default());
    }
}
