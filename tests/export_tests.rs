// tests/export_tests.rs - Workbook, CSV and preview output

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use gradesheet::export::{self, ALL_STUDENTS_SHEET, FILTERED_STUDENTS_SHEET};
use gradesheet::{
    export_dataset, export_views, filter_multi, filter_single, Dataset, ReportParser, Sheet, View,
};
use std::io::Cursor;
use tempfile::TempDir;

const SAMPLE: &str = include_str!("fixtures/sample_report.txt");

fn sample_dataset() -> Dataset {
    let lines: Vec<&str> = SAMPLE.lines().collect();
    ReportParser::new().parse_lines(&lines)
}

fn open(bytes: Vec<u8>) -> Xlsx<Cursor<Vec<u8>>> {
    open_workbook_from_rs(Cursor::new(bytes)).unwrap()
}

fn header_row(workbook: &mut Xlsx<Cursor<Vec<u8>>>, sheet: &str) -> Vec<String> {
    let range = workbook.worksheet_range(sheet).unwrap();
    range
        .rows()
        .next()
        .unwrap()
        .iter()
        .map(|cell| cell.to_string())
        .collect()
}

#[test]
fn test_all_students_roundtrip() {
    let dataset = sample_dataset();
    let mut workbook = open(export_dataset(&dataset, None).unwrap());

    assert_eq!(workbook.sheet_names(), vec![ALL_STUDENTS_SHEET.to_string()]);

    let range = workbook.worksheet_range(ALL_STUDENTS_SHEET).unwrap();
    assert_eq!(range.height(), dataset.len() + 1);

    let expected: Vec<String> = View::full(&dataset).headers();
    assert_eq!(header_row(&mut workbook, ALL_STUDENTS_SHEET), expected);
}

#[test]
fn test_marks_written_as_numbers() {
    let dataset = sample_dataset();
    let mut workbook = open(export_dataset(&dataset, None).unwrap());
    let range = workbook.worksheet_range(ALL_STUDENTS_SHEET).unwrap();

    // row 1 is JOHN DOE; column 3 is 101_Marks, column 4 is 101_Grade
    assert_eq!(range.get_value((1, 0)), Some(&Data::String("12345678".into())));
    assert_eq!(range.get_value((1, 3)), Some(&Data::Float(45.0)));
    assert_eq!(range.get_value((1, 4)), Some(&Data::String("B2".into())));
    assert_eq!(
        range.get_value((4, 9)),
        Some(&Data::String("ESSENTIAL REPEAT".into()))
    );
}

#[test]
fn test_full_export_with_filtered_sheet() {
    let dataset = sample_dataset();
    let filtered = filter_single(&dataset, &["12345678"]);
    let expected_headers = filtered.as_ref().unwrap().headers();
    let mut workbook = open(export_dataset(&dataset, filtered).unwrap());

    assert_eq!(
        workbook.sheet_names(),
        vec![
            ALL_STUDENTS_SHEET.to_string(),
            FILTERED_STUDENTS_SHEET.to_string()
        ]
    );
    assert_eq!(header_row(&mut workbook, ALL_STUDENTS_SHEET).len(), 11);
    assert_eq!(
        header_row(&mut workbook, FILTERED_STUDENTS_SHEET),
        expected_headers
    );

    let range = workbook.worksheet_range(FILTERED_STUDENTS_SHEET).unwrap();
    assert_eq!(range.height(), 2);
}

#[test]
fn test_multi_filter_sheets() {
    let dataset = sample_dataset();
    let sets = vec![
        vec!["12345678"],
        vec![],
        vec!["12345679", "12345681"],
    ];
    let sheets = filter_multi(&dataset, &sets);
    let mut workbook = open(export_views(&sheets).unwrap());

    assert_eq!(
        workbook.sheet_names(),
        vec!["Filter_1".to_string(), "Filter_3".to_string()]
    );
    let range = workbook.worksheet_range("Filter_3").unwrap();
    assert_eq!(range.height(), 3);
}

#[test]
fn test_write_and_preview_workbook() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.xlsx");
    let dataset = sample_dataset();

    let sheets = export::dataset_sheets(&dataset, None);
    export::write_workbook(&sheets, &path).unwrap();

    let preview = export::preview_workbook(&path, 2).unwrap();
    assert_eq!(preview.sheet_names, vec![ALL_STUDENTS_SHEET.to_string()]);
    assert_eq!(preview.total_rows, 5);
    assert_eq!(preview.rows.len(), 2);
    assert_eq!(preview.columns[0], "Roll No");
    assert_eq!(preview.rows[0][0], "12345678");
    assert_eq!(preview.rows[0][3], "45");
}

#[test]
fn test_write_csv() {
    let dir = TempDir::new().unwrap();
    let dataset = sample_dataset();
    let view = filter_single(&dataset, &["12345679"]).unwrap();
    let sheet = Sheet::new("Filtered Students", view);

    export::write_csv(&sheet, dir.path(), "").unwrap();

    let mut reader = csv::Reader::from_path(dir.path().join("Filtered_Students.csv")).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, sheet.view.headers());

    let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "12345679");
    assert_eq!(&rows[0][3], "67");
    assert_eq!(&rows[0][4], "C1");
}

#[test]
fn test_write_csv_with_prefix() {
    let dir = TempDir::new().unwrap();
    let dataset = sample_dataset();
    let first = Sheet::new(ALL_STUDENTS_SHEET, View::full(&dataset));
    let second = Sheet::new(ALL_STUDENTS_SHEET, filter_single(&dataset, &["12345682"]).unwrap());

    export::write_csv(&first, dir.path(), "processed_a_complete").unwrap();
    export::write_csv(&second, dir.path(), "processed_b_complete").unwrap();

    let a = std::fs::read_to_string(dir.path().join("processed_a_complete_All_Students.csv")).unwrap();
    let b = std::fs::read_to_string(dir.path().join("processed_b_complete_All_Students.csv")).unwrap();
    assert_eq!(a.lines().count(), 6);
    assert_eq!(b.lines().count(), 2);
    assert!(b.contains("12345682"));
    assert!(!dir.path().join("All_Students.csv").exists());
}

#[test]
fn test_text_mark_is_not_written_as_number() {
    let lines = ["11111111M ASHA 101 102 PASS", "045 B2 -5 F"];
    let dataset = ReportParser::new().parse_lines(&lines);
    let mut workbook = open(export_dataset(&dataset, None).unwrap());
    let range = workbook.worksheet_range(ALL_STUDENTS_SHEET).unwrap();

    assert_eq!(
        header_row(&mut workbook, ALL_STUDENTS_SHEET)[3..7],
        ["101_Marks", "101_Grade", "102_Marks", "102_Grade"]
    );
    assert_eq!(range.get_value((1, 3)), Some(&Data::Float(45.0)));
    assert_eq!(range.get_value((1, 5)), Some(&Data::String("-5".into())));
    assert_eq!(range.get_value((1, 6)), Some(&Data::String("F".into())));
}
