//! HTTP request handlers.

pub(crate) mod reload;
