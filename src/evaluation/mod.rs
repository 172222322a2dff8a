pub mod dataset;
pub mod evaluator;
pub mod matcher;
pub mod report;
