// Domain layer - Core models and pure logic
pub mod dashboard;
pub mod error;
pub mod plot;
pub mod query;
