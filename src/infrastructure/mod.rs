// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod dashboard_mapper;
pub mod grafana_client;
