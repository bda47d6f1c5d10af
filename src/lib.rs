pub mod analysis;
pub mod app;
pub mod config;
pub mod describe;
pub mod error;
pub mod image_io;
pub mod logging;
pub mod models;
pub mod report;
pub mod routes;
pub mod staging;

pub use app::build_app;
