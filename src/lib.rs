pub mod client;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod harvest;
pub mod http;
pub mod opensearch;
pub mod output;
pub mod status;
pub mod xml;
