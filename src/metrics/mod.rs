use prometheus::{Counter, Histogram};

use crate::metrics::handler::{counter, histogram_fast_ops};
pub mod handler;

lazy_static::lazy_static!(
    pub static ref USERS_REGISTERED_TOTAL: Counter =
        counter("users_registered_total", "Total number of registered users");

    pub static ref LOGINS_FAILED_TOTAL: Counter =
        counter("logins_failed_total", "Total number of rejected login attempts");

    pub static ref TRANSACTIONS_CREATED_TOTAL: Counter =
        counter("transactions_created_total", "Total number of created transactions");

    pub static ref STORAGE_FAILURES_TOTAL: Counter =
        counter("storage_failures_total", "Total number of failed collection file writes");

    pub static ref FILE_WRITE_TIME_SECONDS: Histogram =
        histogram_fast_ops("file_write_time_seconds", "Time spent rewriting a collection file in seconds");
);
