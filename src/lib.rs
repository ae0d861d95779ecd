//! Lead Assist — guided WhatsApp lead capture for machinery sales.

pub mod bot;
pub mod catalog;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod dedup;
pub mod error;
pub mod leads;
pub mod session;
