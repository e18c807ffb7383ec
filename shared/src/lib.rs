//! Wire types shared between the mail-ai API server and its clients.

pub mod api;
pub mod models;
