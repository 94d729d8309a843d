pub mod app;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod error;
pub mod listing;
pub mod output;
pub mod s3;
pub mod s3cmd;
pub mod store;
