use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::debug;
use snafu::prelude::*;

use crate::survey::io_common::{is_time_column, make_default_id, ParsedSheet};
use crate::survey::*;

/// Reads an Excel workbook laid out like the CSV imports: a header row of
/// question subjects, then one answer sheet per row.
pub fn read_excel_sheets(
    path: &str,
    worksheet_name: Option<String>,
) -> BSurveyResult<Vec<ParsedSheet>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet_name {
        Some(name) => workbook
            .worksheet_range(&name)
            .context(ExcelWorksheetMissingSnafu { name: name.clone() })?
            .context(OpeningExcelSnafu { path })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path })?,
    };
    let default_id = make_default_id(path);

    let mut rows = wrange.rows();
    let header_row = rows.next().context(EmptyExcelSnafu {})?;
    let mut headers: Vec<String> = Vec::new();
    for cell in header_row.iter() {
        headers.push(read_cell(cell, 1)?);
    }
    debug!("read_excel_sheets: header: {:?}", headers);
    let time_idx = headers.iter().position(|h| is_time_column(h));

    let mut res: Vec<ParsedSheet> = Vec::new();
    for (idx, row) in rows.enumerate() {
        let lineno = idx + 2;
        let mut cells: Vec<(String, String)> = Vec::new();
        let mut time: Option<String> = None;
        for (col, header) in headers.iter().enumerate() {
            let value = match row.get(col) {
                Some(cell) => read_cell(cell, lineno as u64)?,
                None => String::new(),
            };
            if Some(col) == time_idx {
                time = Some(value);
            } else if !header.is_empty() {
                cells.push((header.clone(), value));
            }
        }
        let ps = ParsedSheet {
            id: default_id(lineno),
            time,
            cells,
        };
        debug!("read_excel_sheets: {:?}", ps);
        res.push(ps);
    }
    Ok(res)
}

fn read_cell(cell: &DataType, lineno: u64) -> SurveyResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Empty => Ok(String::new()),
        DataType::Int(i) => Ok(i.to_string()),
        // Spreadsheets store all numbers as floats.
        DataType::Float(f) if f.fract() == 0.0 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        _ => Err(SurveyError::ExcelWrongCellType {
            lineno,
            content: format!("{:?}", cell),
        }),
    }
}
