// Library for tests to access modules

pub mod alert_engine;
pub mod alert_repo;
pub mod classifier;
pub mod config;
pub mod db;
pub mod device_repo;
pub mod ip_advisor;
pub mod local_stats;
pub mod metric_repo;
pub mod models;
pub mod probe;
pub mod routes;
pub mod sampler;
pub mod scan_engine;
pub mod version;
