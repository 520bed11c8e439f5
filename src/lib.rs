pub mod builder;
pub mod common;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod present;
pub mod query;
pub mod render;
pub mod response;
pub mod schema;
pub mod session;
