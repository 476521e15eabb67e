use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Report file not found: {}", path.display())]
    InputAbsent { path: PathBuf },

    #[error("Report file is not valid UTF-8: {}", path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("No roll numbers provided")]
    NoRollNumbers,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Workbook write error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("Workbook read error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;
