//! SQLite persistence for finalized session results and student risk
//! factors. Implements [`crate::interfaces::ResultStore`] and
//! [`crate::interfaces::StudentContext`].

mod connection;
mod helpers;
mod migrations;
mod repositories;

pub use connection::Database;
