pub mod batch;
pub mod config;
pub mod driver;
pub mod errors;
pub mod export;
pub mod normalize;
pub mod options;
pub mod output;
pub mod provider;
pub mod resolver;
pub mod summary;
pub mod tables;
