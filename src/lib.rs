pub mod cache;
pub mod error;
pub mod export;
pub mod filter;
pub mod models;
pub mod parser;

pub use cache::{CacheKey, DatasetCache};
pub use error::{ReportError, Result};
pub use export::{export_dataset, export_views, preview_workbook, WorkbookPreview};
pub use filter::{filter_multi, filter_single, parse_roll_list, select_subset, Sheet, View};
pub use models::{Candidate, Cell, Column, Config, Dataset, Mark, ResultClass, ResultStats, SubjectScore};
pub use parser::{build_dataset, discover_schema, parse_header, parse_marks_line, HeaderFields, ReportParser};
