pub mod aggregation;
pub mod auth_service;
pub mod media_service;
pub mod validation;
