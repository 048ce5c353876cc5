pub mod catalog;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod hbase;
pub mod loader;
pub mod output;
pub mod progress;
pub mod report;
pub mod sources;
pub mod staging;
pub mod webhdfs;
