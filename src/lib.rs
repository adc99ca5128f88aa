pub mod app;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod food;
pub mod groups;
pub mod history;
pub mod images;
pub mod meals;
pub mod realtime;
pub mod state;
pub mod storage;
