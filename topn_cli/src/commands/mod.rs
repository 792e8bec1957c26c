pub mod list;
pub mod query;
pub mod report;
pub mod run;
pub mod validate;
