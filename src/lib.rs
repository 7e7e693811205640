pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod job;
pub mod masking;
pub mod output;
pub mod params;
pub mod query;
pub mod storage;
pub mod template;
pub mod verbose;
