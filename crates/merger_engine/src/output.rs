use std::fs::File;

use rust_xlsxwriter::{Workbook, XlsxError};

/// The single-sheet, constant-memory workbook a merge writes into.
///
/// Rows must be written in ascending order; each finished row is flushed to
/// the writer's own temp storage instead of being kept in memory.
pub(crate) struct OutputWorkbook {
    workbook: Workbook,
}

impl OutputWorkbook {
    pub(crate) fn new(sheet_name: &str) -> Result<Self, XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet_with_constant_memory();
        sheet.set_name(sheet_name)?;
        Ok(Self { workbook })
    }

    /// Writes `cells` as string cells of `row`; empty strings leave the cell blank.
    pub(crate) fn write_row(&mut self, row: u32, cells: &[String]) -> Result<(), XlsxError> {
        let sheet = self.workbook.worksheet_from_index(0)?;
        for (col, value) in cells.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
            sheet.write_string(row, col, value)?;
        }
        Ok(())
    }

    pub(crate) fn save_to(&mut self, file: &mut File) -> Result<(), XlsxError> {
        self.workbook.save_to_writer(file)
    }
}
