//! Session-scoped Spotify token management and playback remote control.
//!
//! # Modules
//!
//! * [`remote`] - play, pause and skip on behalf of a session
//! * [`devices`] - finding or activating a playback device
//! * [`api`] - authenticated Web API requests with retries
//! * [`auth`] - authorization codes and token refreshes
//! * [`tokens`] and [`store`] - token records and their persistence
//! * [`retry`] - retry budgets and backoff
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod api;
pub mod auth;
pub mod config;
pub mod devices;
pub mod error;
pub mod http;
pub mod protocol;
pub mod remote;
pub mod retry;
pub mod store;
pub mod tokens;
