#![doc = "site-sync: command-line front end and AWS adapters for the site-sync-core engine."]

pub mod aws;
pub mod cli;
pub mod cloudfront;
pub mod load_config;
pub mod progress;
pub mod s3;
