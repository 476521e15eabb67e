use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_directory: Option<String>,
    // Also write one CSV file per exported sheet
    pub write_csv: bool,
    pub cache_capacity: u64,
    pub preview_rows: usize,
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: Some("output".to_string()),
            write_csv: false,
            cache_capacity: 64,
            preview_rows: 10,
            log_filter: None,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn output_dir(&self) -> &str {
        self.output_directory.as_deref().unwrap_or("output")
    }
}

/// Terminal result classification printed at the end of a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResultClass {
    Pass,
    Comp,
    Ufm,
    Abst,
    Repeat,
    EssentialRepeat,
    /// No recognised result token on the line.
    #[default]
    Other,
}

impl ResultClass {
    /// Maps a single result token. `ESSENTIAL REPEAT` spans two tokens and is
    /// recognised by the tokenizer, not here.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "PASS" => Some(Self::Pass),
            "COMP" => Some(Self::Comp),
            "UFM" => Some(Self::Ufm),
            "ABST" => Some(Self::Abst),
            "REPEAT" => Some(Self::Repeat),
            _ => None,
        }
    }

    /// Text written to the Result column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Comp => "COMP",
            Self::Ufm => "UFM",
            Self::Abst => "ABST",
            Self::Repeat => "REPEAT",
            Self::EssentialRepeat => "ESSENTIAL REPEAT",
            Self::Other => "",
        }
    }

    /// Unfair-means and absent candidates carry no valid marks.
    pub fn voids_marks(&self) -> bool {
        matches!(self, Self::Ufm | Self::Abst)
    }
}

impl fmt::Display for ResultClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mark {
    #[default]
    Blank,
    Number(i64),
    /// Non-numeric placeholder kept verbatim, e.g. `-5` or `AB`.
    Text(String),
}

impl Mark {
    /// Stores digit-only marks as integers and anything else as text.
    pub fn from_token(token: &str) -> Self {
        if token.is_empty() {
            return Mark::Blank;
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(value) = token.parse::<i64>() {
                return Mark::Number(value);
            }
        }
        Mark::Text(token.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubjectScore {
    pub mark: Mark,
    pub grade: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub roll_no: String,
    pub gender: String,
    pub name: String,
    pub subjects_taken: Vec<String>,
    pub result: ResultClass,
    pub comp_subjects: String,
    /// One entry per subject code in the file-wide schema.
    pub marks_by_subject: BTreeMap<String, SubjectScore>,
}

impl Candidate {
    pub fn score(&self, code: &str) -> Option<&SubjectScore> {
        self.marks_by_subject.get(code)
    }

    pub fn cell(&self, column: &Column) -> Cell<'_> {
        match column {
            Column::RollNo => Cell::Text(&self.roll_no),
            Column::Gender => Cell::Text(&self.gender),
            Column::Name => Cell::Text(&self.name),
            Column::Marks(code) => match self.score(code).map(|s| &s.mark) {
                Some(Mark::Number(n)) => Cell::Number(*n),
                Some(Mark::Text(t)) => Cell::Text(t),
                Some(Mark::Blank) | None => Cell::Blank,
            },
            Column::Grade(code) => match self.score(code) {
                Some(score) if !score.grade.is_empty() => Cell::Text(&score.grade),
                _ => Cell::Blank,
            },
            Column::Result => Cell::Text(self.result.as_str()),
            Column::CompSubjects => Cell::Text(&self.comp_subjects),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    RollNo,
    Gender,
    Name,
    Marks(String),
    Grade(String),
    Result,
    CompSubjects,
}

impl Column {
    pub fn header(&self) -> String {
        match self {
            Column::RollNo => "Roll No".to_string(),
            Column::Gender => "Gender".to_string(),
            Column::Name => "Name".to_string(),
            Column::Marks(code) => format!("{}_Marks", code),
            Column::Grade(code) => format!("{}_Grade", code),
            Column::Result => "Result".to_string(),
            Column::CompSubjects => "Comp Sub".to_string(),
        }
    }

    /// Identifier, demographic and result columns survive blank-column removal.
    pub fn is_essential(&self) -> bool {
        !matches!(self, Column::Marks(_) | Column::Grade(_))
    }

    pub fn is_marks(&self) -> bool {
        matches!(self, Column::Marks(_))
    }

    /// `[RollNo, Gender, Name, <code>_Marks, <code>_Grade ..., Result, CompSubjects]`
    pub fn layout(subject_codes: &[String]) -> Vec<Column> {
        let mut columns = vec![Column::RollNo, Column::Gender, Column::Name];
        for code in subject_codes {
            columns.push(Column::Marks(code.clone()));
            columns.push(Column::Grade(code.clone()));
        }
        columns.push(Column::Result);
        columns.push(Column::CompSubjects);
        columns
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell<'a> {
    Blank,
    Text(&'a str),
    Number(i64),
}

impl Cell<'_> {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Blank => true,
            Cell::Text(text) => {
                let trimmed = text.trim();
                trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan")
            }
            Cell::Number(_) => false,
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Cell::Blank => String::new(),
            Cell::Text(text) => text.to_string(),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// Counts of candidates per result bucket, reported alongside a full export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResultStats {
    pub total: usize,
    pub pass: usize,
    pub comp: usize,
    pub essential_repeat: usize,
    pub abst: usize,
    pub ufm: usize,
    pub other: usize,
}

impl ResultStats {
    /// Writes the counts as TOML next to an exported workbook.
    pub fn save_to_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn record(&mut self, result: ResultClass) {
        self.total += 1;
        match result {
            ResultClass::Pass => self.pass += 1,
            ResultClass::Comp => self.comp += 1,
            ResultClass::EssentialRepeat => self.essential_repeat += 1,
            ResultClass::Abst => self.abst += 1,
            ResultClass::Ufm => self.ufm += 1,
            ResultClass::Repeat | ResultClass::Other => self.other += 1,
        }
    }

    pub fn buckets(&self) -> [(&'static str, usize); 7] {
        [
            ("TOTAL", self.total),
            ("PASS", self.pass),
            ("COMP", self.comp),
            ("ESSENTIAL REPEAT", self.essential_repeat),
            ("ABST", self.abst),
            ("UFM", self.ufm),
            ("OTHER", self.other),
        ]
    }
}

/// Parsed contents of one report file. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub records: Vec<Candidate>,
    pub subject_codes: Vec<String>,
    pub columns: Vec<Column>,
    pub stats: ResultStats,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
