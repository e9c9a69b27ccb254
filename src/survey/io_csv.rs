// Primitives for reading CSV files.

use log::debug;
use snafu::prelude::*;

use crate::survey::io_common::{is_time_column, make_default_id, ParsedSheet};
use crate::survey::*;

/// Reads a CSV file with a header row of question subjects.
///
/// A column named `time` holds the submission time. All the other columns
/// must match a question subject.
pub fn read_csv_sheets(path: &str) -> BSurveyResult<Vec<ParsedSheet>> {
    let default_id = make_default_id(path);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu {})?;
    let headers: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu {})?
        .iter()
        .map(|s| s.to_string())
        .collect();
    debug!("read_csv_sheets: headers: {:?}", headers);
    let time_idx = headers.iter().position(|h| is_time_column(h));

    let mut res: Vec<ParsedSheet> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {})?;
        let mut cells: Vec<(String, String)> = Vec::new();
        let mut time: Option<String> = None;
        for (col, header) in headers.iter().enumerate() {
            let value = line.get(col).unwrap_or("").to_string();
            if Some(col) == time_idx {
                time = Some(value);
            } else if !header.trim().is_empty() {
                cells.push((header.clone(), value));
            }
        }
        let ps = ParsedSheet {
            id: default_id(lineno),
            time,
            cells,
        };
        debug!("read_csv_sheets: {:?}", ps);
        res.push(ps);
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_rows_with_time() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("answers.csv");
        fs::write(&p, "Name,Time,Color\nAnn,2024-01-01 09:00:00,red┋blue\nBen,,\n").unwrap();
        let sheets = read_csv_sheets(&p.display().to_string()).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].id, "answers.csv-00000002");
        assert_eq!(sheets[0].time.as_deref(), Some("2024-01-01 09:00:00"));
        assert_eq!(
            sheets[0].cells,
            vec![
                ("Name".to_string(), "Ann".to_string()),
                ("Color".to_string(), "red┋blue".to_string())
            ]
        );
        assert_eq!(sheets[1].cells[1].1, "");
    }

    #[test]
    fn without_time_column() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("answers.csv");
        fs::write(&p, "Name\nAnn\n").unwrap();
        let sheets = read_csv_sheets(&p.display().to_string()).unwrap();
        assert_eq!(sheets[0].time, None);
    }

    #[test]
    fn empty_header_cells_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("answers.csv");
        fs::write(&p, "Name,Color,\nAnn,red,\n").unwrap();
        let sheets = read_csv_sheets(&p.display().to_string()).unwrap();
        assert_eq!(
            sheets[0].cells,
            vec![
                ("Name".to_string(), "Ann".to_string()),
                ("Color".to_string(), "red".to_string())
            ]
        );
    }

    #[test]
    fn missing_file() {
        assert!(read_csv_sheets("/nonexistent/answers.csv").is_err());
    }
}
