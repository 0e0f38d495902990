pub mod parser;
pub mod persistence;
