pub mod analysis;
pub mod api;
pub mod charts;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod forecast;
pub mod repo;
pub mod state;
pub mod storage;
pub mod telemetry;
