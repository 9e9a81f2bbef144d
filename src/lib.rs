//! Decoding and dispatch of Uniden scanner responses.
//!
//! A raw response line is resolved to a formatter by its command token,
//! decoded into named fields and handed to every subscribed consumer.

pub mod acks;
pub mod consumer;
pub mod decoder;
pub mod dispatch;
pub mod errors;
pub mod filter;
pub mod formatters;
pub mod listing;
pub mod model;
pub mod monitor;
pub mod record_sink;
pub mod registry;
pub mod resolver;
pub mod source;
pub mod titler;
