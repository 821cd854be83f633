// Application layer - Use cases over trait seams
pub mod collector;
pub mod device;
pub mod query_service;
pub mod registry;
pub mod store;
