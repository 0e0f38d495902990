pub mod alert;
pub mod error;
pub mod ids;
pub mod incident;
pub mod service;
