//! Messaging channels.

pub mod whatsapp;
