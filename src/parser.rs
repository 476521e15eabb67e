use crate::error::{ReportError, Result};
use crate::models::{Candidate, Column, Dataset, Mark, ResultClass, ResultStats, SubjectScore};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Width of the roll-number field at the start of a header line.
const ROLL_NO_WIDTH: usize = 8;

/// Fields recovered from one candidate header line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFields {
    pub roll_no: String,
    pub gender: String,
    pub name: String,
    pub subjects: Vec<String>,
    pub result: ResultClass,
    pub comp_subjects: String,
}

pub struct ReportParser;

impl ReportParser {
    pub fn new() -> Self {
        Self
    }

    /// Reads a report into lines with line endings removed.
    pub fn read_lines(&self, file_path: &Path) -> Result<Vec<String>> {
        let bytes = fs::read(file_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ReportError::InputAbsent {
                path: file_path.to_path_buf(),
            },
            _ => ReportError::Io(e),
        })?;
        let content = String::from_utf8(bytes).map_err(|_| ReportError::InvalidUtf8 {
            path: file_path.to_path_buf(),
        })?;
        Ok(content.lines().map(str::to_string).collect())
    }

    pub fn parse_file(&self, file_path: &Path) -> Result<Dataset> {
        let lines = self.read_lines(file_path)?;
        let dataset = self.parse_lines(&lines);
        info!(
            file = %file_path.display(),
            candidates = dataset.len(),
            subjects = dataset.subject_codes.len(),
            "parsed report"
        );
        Ok(dataset)
    }

    /// Schema discovery followed by candidate building.
    pub fn parse_lines<S: AsRef<str>>(&self, lines: &[S]) -> Dataset {
        let schema = discover_schema(lines);
        build_dataset(lines, &schema)
    }
}

impl Default for ReportParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `s` after its first `n` characters.
fn split_chars(s: &str, n: usize) -> (&str, &str) {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s.split_at(idx),
        None => (s, ""),
    }
}

fn is_subject_code(token: &str) -> bool {
    token.chars().count() == 3 && token.chars().all(|c| c.is_ascii_digit())
}

fn is_mark_token(token: &str) -> bool {
    let digits: String = token.chars().filter(|&c| c != '-').collect();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// A header line starts with a numeric roll number in its first 8 characters.
pub fn is_header_line(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    let roll = split_chars(line, ROLL_NO_WIDTH).0.trim();
    !roll.is_empty() && roll.chars().all(|c| c.is_ascii_digit())
}

/// Tokenizes a header line. Never fails: missing fields come back empty.
pub fn parse_header(line: &str) -> HeaderFields {
    let (roll_part, rest) = split_chars(line, ROLL_NO_WIDTH);
    let roll_no = roll_part.trim().to_string();

    let rest = rest.trim_start();
    let mut chars = rest.chars();
    let Some(gender) = chars.next() else {
        return HeaderFields {
            roll_no,
            ..HeaderFields::default()
        };
    };

    let tokens: Vec<&str> = chars.as_str().split_whitespace().collect();
    let mut name_parts = Vec::new();
    let mut subjects = Vec::new();
    let mut result = ResultClass::Other;
    let mut comp_tokens: &[&str] = &[];
    let mut in_subjects = false;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if is_subject_code(token) {
            in_subjects = true;
            subjects.push(token.to_string());
        } else if !in_subjects {
            name_parts.push(token);
        } else if token == "ESSENTIAL" && tokens.get(i + 1) == Some(&"REPEAT") {
            result = ResultClass::EssentialRepeat;
            comp_tokens = &tokens[i + 2..];
            break;
        } else if let Some(class) = ResultClass::from_token(token) {
            result = class;
            comp_tokens = &tokens[i + 1..];
            break;
        }
        // anything else between the subjects and the result is ignored
        i += 1;
    }

    HeaderFields {
        roll_no,
        gender: gender.to_string(),
        name: name_parts.join(" "),
        subjects,
        result,
        comp_subjects: comp_tokens.join(" "),
    }
}

/// Splits a marks line into `(mark, grade)` pairs in order of appearance.
pub fn parse_marks_line(line: &str) -> Vec<(String, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut pairs = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        if !is_mark_token(tokens[i]) {
            i += 1;
            continue;
        }
        let stripped = tokens[i].trim_start_matches('0');
        let mark = if stripped.is_empty() { "0" } else { stripped };
        // the following token is the grade, whatever it looks like
        let grade = tokens.get(i + 1).copied().unwrap_or("");
        pairs.push((mark.to_string(), grade.to_string()));
        i += 2;
    }

    pairs
}

/// Sorted, de-duplicated subject codes across every header line.
pub fn discover_schema<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut codes = BTreeSet::new();
    for line in lines {
        let line = line.as_ref().trim();
        if is_header_line(line) {
            codes.extend(parse_header(line).subjects);
        }
    }
    codes.into_iter().collect()
}

/// Pairs each header line with the line after it and builds one candidate per pair.
pub fn build_dataset<S: AsRef<str>>(lines: &[S], schema: &[String]) -> Dataset {
    let mut records = Vec::new();
    let mut stats = ResultStats::default();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].as_ref().trim();
        if !is_header_line(line) {
            i += 1;
            continue;
        }

        let header = parse_header(line);
        let marks_line = lines.get(i + 1).map(|l| l.as_ref().trim()).unwrap_or("");
        let marks = parse_marks_line(marks_line);
        stats.record(header.result);
        records.push(build_candidate(header, &marks, schema));

        i += 2;
    }

    debug!(candidates = records.len(), "built dataset");
    Dataset {
        records,
        subject_codes: schema.to_vec(),
        columns: Column::layout(schema),
        stats,
    }
}

fn build_candidate(header: HeaderFields, marks: &[(String, String)], schema: &[String]) -> Candidate {
    let mut marks_by_subject: BTreeMap<String, SubjectScore> = schema
        .iter()
        .map(|code| (code.clone(), SubjectScore::default()))
        .collect();

    if !header.result.voids_marks() {
        for (code, (mark, grade)) in header.subjects.iter().zip(marks) {
            if let Some(slot) = marks_by_subject.get_mut(code) {
                *slot = SubjectScore {
                    mark: Mark::from_token(mark),
                    grade: grade.clone(),
                };
            }
        }
    }

    Candidate {
        roll_no: header.roll_no,
        gender: header.gender,
        name: header.name,
        subjects_taken: header.subjects,
        result: header.result,
        comp_subjects: header.comp_subjects,
        marks_by_subject,
    }
}
