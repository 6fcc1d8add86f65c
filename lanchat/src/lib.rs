//! `LanChat`: notification and file-transfer mediator for a LAN chat client.
//!
//! The [`facade::ChatFacade`] sits between a chat engine ([`engine::ChatEngine`])
//! and whatever front-end shows conversations ([`surface::ConversationSurface`]).

pub mod config;
pub mod engine;
pub mod facade;
pub mod history;
pub mod notify;
pub mod surface;
pub mod transfer;
pub mod user;
