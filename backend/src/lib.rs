pub mod camera;
pub mod config;
pub mod error;
pub mod inference;
pub mod model;
pub mod pages;
pub mod routes;
pub mod storage;
pub mod stream;
