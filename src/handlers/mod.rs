//! HTTP handlers, one module per domain area.
//!
//! Every handler resolves the caller (or not, for public routes), checks the rules
//! that belong to the request, calls the service layer, and turns the outcome into
//! a response. Errors are always `AppError`, so the status mapping lives in one place.

pub mod admin;
pub mod communities;
pub mod messages;
pub mod notifications;
pub mod posts;
pub mod reports;
pub mod tags;
pub mod uploads;
pub mod users;
