//! Routers grouped by access level. Access control is attached per group in
//! `create_router`, so a handler cannot end up public by accident.

/// No session required; handlers that care take `MaybeUser`.
pub mod public;

/// Every route requires a valid session.
pub mod authenticated;

/// Nested under `/admin`; requires a session with the `admin` role.
pub mod admin;
