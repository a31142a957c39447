pub mod advice;
pub mod aggregate;
pub mod csv_import;
pub mod dates;
pub mod db;
pub mod llm;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod service;
pub mod summary;
pub mod window;
