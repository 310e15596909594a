pub mod cli;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod executor;
pub mod masking;
pub mod output;
pub mod server;
pub mod verbose;
