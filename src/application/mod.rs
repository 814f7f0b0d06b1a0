// Application layer - Use cases and ports
pub mod export_service;
pub mod grafana_repository;
pub mod variable_service;
