use std::io::{Read, Seek};
use std::ops::ControlFlow;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets, Xlsx};
use engine_logging::engine_debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Open(String),
    #[error("{0}")]
    Read(String),
}

/// Streams the rows of the first sheet of `path` into `visit`, in order.
///
/// Each row is the string form of its cells, indexed by absolute column
/// (holes are empty strings) with trailing empty cells dropped. Rows left
/// with no cells are not delivered, whatever the file format.
/// Returns `Ok(Some(b))` if `visit` broke out early, `Ok(None)` once every
/// row was delivered.
pub fn read_first_sheet<B>(
    path: &Path,
    mut visit: impl FnMut(Vec<String>) -> ControlFlow<B>,
) -> Result<Option<B>, SourceError> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| SourceError::Open(err.to_string()))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        engine_debug!("{:?} has no sheets", path);
        return Ok(None);
    };

    match &mut workbook {
        Sheets::Xlsx(xlsx) => stream_xlsx(xlsx, &sheet, &mut visit),
        other => {
            // Binary and ODS readers only expose whole-sheet ranges.
            let range = other
                .worksheet_range(&sheet)
                .map_err(|err| SourceError::Read(err.to_string()))?;
            Ok(visit_range(&range, &mut visit))
        }
    }
}

fn stream_xlsx<RS, B>(
    xlsx: &mut Xlsx<RS>,
    sheet: &str,
    visit: &mut impl FnMut(Vec<String>) -> ControlFlow<B>,
) -> Result<Option<B>, SourceError>
where
    RS: Read + Seek,
{
    let mut cells = xlsx
        .worksheet_cells_reader(sheet)
        .map_err(|err| SourceError::Read(err.to_string()))?;

    let mut current: Option<(u32, Vec<String>)> = None;
    while let Some(cell) = cells
        .next_cell()
        .map_err(|err| SourceError::Read(err.to_string()))?
    {
        let (row, col) = cell.get_position();
        let value = cell_text(&Data::from(cell.get_value().clone()));

        let mut values = match current.take() {
            Some((index, values)) if index == row => values,
            Some((_, finished)) => {
                if let Some(b) = deliver(finished, visit) {
                    return Ok(Some(b));
                }
                Vec::new()
            }
            None => Vec::new(),
        };
        place(&mut values, col as usize, value);
        current = Some((row, values));
    }

    Ok(current.and_then(|(_, last)| deliver(last, visit)))
}

fn visit_range<B>(
    range: &Range<Data>,
    visit: &mut impl FnMut(Vec<String>) -> ControlFlow<B>,
) -> Option<B> {
    let first_col = range.start().map_or(0, |(_, col)| col as usize);
    for row in range.rows() {
        let mut values = vec![String::new(); first_col];
        values.extend(row.iter().map(cell_text));
        if let Some(b) = deliver(values, visit) {
            return Some(b);
        }
    }
    None
}

/// Drops trailing empty cells and hands the row to `visit` unless nothing is left.
fn deliver<B>(
    mut values: Vec<String>,
    visit: &mut impl FnMut(Vec<String>) -> ControlFlow<B>,
) -> Option<B> {
    while values.last().is_some_and(String::is_empty) {
        values.pop();
    }
    if values.is_empty() {
        return None;
    }
    match visit(values) {
        ControlFlow::Break(b) => Some(b),
        ControlFlow::Continue(()) => None,
    }
}

fn place(values: &mut Vec<String>, col: usize, value: String) {
    if values.len() <= col {
        values.resize(col + 1, String::new());
    }
    values[col] = value;
}

/// String form of one cell, as written to the merged sheet.
pub fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => value.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(value) => value.as_f64().to_string(),
        other => other.to_string(),
    }
}
