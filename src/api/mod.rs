//! Trend Vision One platform API.
//!
//! This module provides functionality for:
//! - Authenticated calls with retry and exponential backoff on 429/5xx/network failures
//! - Paging through IAM accounts
//! - Looking up each account's most recent login in the audit logs

pub mod accounts;
pub mod audit_logs;
pub mod client;
pub mod models;
pub mod pagination;
pub mod retry;

pub use audit_logs::LoginQuery;
pub use client::ApiClient;
