// File I/O: GGE documents in, mapping tables in, Excel reports out

pub mod error;
pub mod gge;
pub mod report;
pub mod tables;
pub mod text;

pub use error::IoError;
pub use gge::{discover_documents, load_corpus, load_document, parse_document};
pub use report::{write_combined_report, write_document_workbook, write_lsr_summary};
pub use tables::{load_classification, load_unit_economics};
