pub mod app;
pub mod controllers;
pub mod error;
pub mod middlewares;
pub mod router;
pub mod state;
pub mod tracing;
pub mod uploads;
pub mod views;
