// Primitives for reading a roster from a file.

use std::fs;

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::{debug, info, warn};
use snafu::prelude::*;

use crate::stars::{io_common::*, *};

/// Reads the names of a roster file. The format follows the extension of the file.
pub fn read_roster_file(path: &str, worksheet: Option<&str>) -> StarsResult<Vec<String>> {
    let names = match file_extension(path).as_str() {
        "csv" => read_csv_roster(path)?,
        "xlsx" | "xlsm" => read_excel_roster(path, worksheet)?,
        _ => read_text_roster(path)?,
    };
    info!("read_roster_file: {} names in {:?}", names.len(), path);
    Ok(names)
}

fn read_csv_roster(path: &str) -> StarsResult<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut res: Vec<String> = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let lineno = idx + 1;
        let record = record.context(CsvLineParseSnafu { path, lineno })?;
        debug!("read_csv_roster: lineno: {:?} row: {:?}", lineno, record);
        res.extend(record.iter().map(|s| s.to_string()));
    }
    Ok(res)
}

fn read_excel_roster(path: &str, worksheet: Option<&str>) -> StarsResult<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let wrange = match worksheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    }
    .context(EmptyExcelSnafu { path })?
    .context(OpeningExcelSnafu { path })?;

    let mut res: Vec<String> = Vec::new();
    for row in wrange.rows() {
        for cell in row {
            match cell {
                DataType::String(s) => res.extend(split_names(&[s])),
                DataType::Empty => {}
                x => warn!("read_excel_roster: skipping cell {:?}", x),
            }
        }
    }
    Ok(res)
}

fn read_text_roster(path: &str) -> StarsResult<Vec<String>> {
    let contents = fs::read_to_string(path).context(OpeningTextSnafu { path })?;
    Ok(split_names(&[contents]))
}
