mod app;
mod error;
mod logger;
