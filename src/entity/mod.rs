//! Database entity models for the JobAI access gate.
//!
//! These Sea-ORM entities define the tables the session store and the user
//! directory read and write. Validation of the values stored in them lives in
//! [`crate::validation`], separate from the shape declared here.

/// Session records backing issued credentials.
pub mod session;

/// User records the credential issuer derives claims from.
pub mod user;
