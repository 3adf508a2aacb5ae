//! Analysis records: lifecycle, persistence and the cached section pass.

pub mod handlers;
pub mod manager;
pub mod sections;
pub mod store;
