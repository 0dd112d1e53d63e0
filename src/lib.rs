pub mod app;
pub mod catalog;
pub mod client;
pub mod config;
pub mod coords;
pub mod domain;
pub mod download;
pub mod error;
pub mod fov;
pub mod gaia;
pub mod html;
pub mod matcher;
pub mod output;
pub mod resolver;
pub mod store;
pub mod summary;
pub mod toi;
