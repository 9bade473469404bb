pub mod chat;
pub mod config;
pub mod error;
pub mod game;
pub mod history;
pub mod night;
pub mod notification;
pub mod player;
pub mod role;
pub mod roster;
pub mod session;
pub mod vote;
