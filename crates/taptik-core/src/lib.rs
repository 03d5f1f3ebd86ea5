pub mod builder;
pub mod config;
pub mod context;
pub mod converter;
pub mod error;
pub mod io;
pub mod mapping;
pub mod parser;
pub mod paths;
pub mod records;
pub mod types;

pub use error::{Result, TaptikError};
