#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use calamine::{open_workbook, Reader, Xlsx};
use merger_core::{ProgressEvent, ReportLevel};
use merger_engine::{cell_text, ProgressSink, DEFAULT_SHEET_NAME};
use rust_xlsxwriter::Workbook;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

/// Writes `rows` as string cells of the first sheet; "" leaves the cell empty.
pub fn write_xlsx(dir: &Path, name: &str, rows: &[&[&str]]) -> PathBuf {
    let path = dir.join(name);
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            sheet.write_string(r as u32, c as u16, *value).unwrap();
        }
    }
    workbook.save(&path).unwrap();
    path
}

/// Reads back the merged sheet, trailing empty cells dropped.
pub fn read_merged(path: &Path) -> Vec<Vec<String>> {
    let mut workbook: Xlsx<_> = open_workbook(path).unwrap();
    let range = workbook.worksheet_range(DEFAULT_SHEET_NAME).unwrap();
    range
        .rows()
        .map(|row| {
            let mut values: Vec<String> = row.iter().map(cell_text).collect();
            while values.last().is_some_and(String::is_empty) {
                values.pop();
            }
            values
        })
        .collect()
}

pub fn strings(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect()
}

#[derive(Default)]
pub struct TestSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl TestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn levels(events: &[ProgressEvent]) -> Vec<ReportLevel> {
    events.iter().map(|e| e.level).collect()
}
