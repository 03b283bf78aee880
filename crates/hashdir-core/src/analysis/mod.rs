pub mod duplicates;
pub mod report;
