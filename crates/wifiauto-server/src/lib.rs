//! # wifiauto-server
//!
//! HTTP daemon library for wifiauto.
//!
//! This library provides the API handlers, the Linux platform adapters and
//! the state assembly for the automation engine in `wifiauto-core`.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod platform;
pub mod state;
