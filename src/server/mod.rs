pub mod auth;
pub mod chat;
pub mod chat_store;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod fame;
pub mod fanout;
pub mod matching;
pub mod registry;
pub mod social_graph;
pub mod websocket;
