use crate::models::{Candidate, Column, Dataset};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

static ROLL_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,\r\n]").unwrap());

/// A filtered projection of a dataset. Borrows the records and never mutates them.
#[derive(Debug, Clone)]
pub struct View<'a> {
    pub records: Vec<&'a Candidate>,
    pub columns: Vec<Column>,
}

impl<'a> View<'a> {
    /// Every record and every column, as on the "All Students" sheet.
    pub fn full(dataset: &'a Dataset) -> Self {
        Self {
            records: dataset.records.iter().collect(),
            columns: dataset.columns.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(Column::header).collect()
    }

    /// Removes non-essential columns that are blank for every record.
    pub fn drop_blank_columns(mut self) -> Self {
        let records = &self.records;
        let before = self.columns.len();
        self.columns.retain(|column| {
            column.is_essential() || records.iter().any(|r| !r.cell(column).is_blank())
        });
        debug!(dropped = before - self.columns.len(), "removed empty columns");
        self
    }
}

/// One view destined for its own worksheet.
#[derive(Debug, Clone)]
pub struct Sheet<'a> {
    pub name: String,
    pub view: View<'a>,
}

impl<'a> Sheet<'a> {
    pub fn new(name: impl Into<String>, view: View<'a>) -> Self {
        Self {
            name: name.into(),
            view,
        }
    }
}

/// Splits free-form roll-number input on commas and newlines.
pub fn parse_roll_list(text: &str) -> Vec<String> {
    ROLL_SEPARATOR
        .split(text)
        .map(str::trim)
        .filter(|roll| !roll.is_empty())
        .map(str::to_string)
        .collect()
}

/// Records whose roll number is in `ids`, in dataset order. `None` when nothing matches.
pub fn select_subset<'a, S: AsRef<str>>(dataset: &'a Dataset, ids: &[S]) -> Option<View<'a>> {
    let wanted: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
    let records: Vec<&Candidate> = dataset
        .records
        .iter()
        .filter(|candidate| wanted.contains(candidate.roll_no.as_str()))
        .collect();

    if records.is_empty() {
        return None;
    }
    Some(View {
        records,
        columns: dataset.columns.clone(),
    })
}

/// Subset plus blank-column removal. `None` is a no-match, not an error.
pub fn filter_single<'a, S: AsRef<str>>(dataset: &'a Dataset, ids: &[S]) -> Option<View<'a>> {
    select_subset(dataset, ids).map(View::drop_blank_columns)
}

/// One sheet per id-set that matches something, labelled `Filter_<k>` by the
/// set's position in the input. Unproductive sets are skipped but keep their index.
pub fn filter_multi<'a, S: AsRef<str>>(dataset: &'a Dataset, id_sets: &[Vec<S>]) -> Vec<Sheet<'a>> {
    let mut sheets = Vec::new();
    for (idx, ids) in id_sets.iter().enumerate() {
        let label = format!("Filter_{}", idx + 1);
        if ids.is_empty() {
            debug!(%label, "skipping empty roll-number set");
            continue;
        }
        match filter_single(dataset, ids) {
            Some(view) => sheets.push(Sheet::new(label, view)),
            None => debug!(%label, "no candidates matched"),
        }
    }
    sheets
}
