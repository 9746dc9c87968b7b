//! # JobAI Access Gate
//!
//! Authentication, session and authorization gate for the JobAI job-application
//! tracker, built on [axum](https://crates.io/crates/axum) and
//! [Sea-ORM](https://crates.io/crates/sea-orm).
//!
//! Every request to a protected path is intercepted before it reaches a route
//! handler. The gate resolves the caller's credential into [`Claims`] and
//! either lets the request through or redirects it to the login, email
//! verification or subscription page.
//!
//! ## Features
//!
//! - Segment-aware path classification with a public default ([`PathTable`])
//! - Signed bearer credentials carrying a claims snapshot ([`TokenSigner`])
//! - Session records with revocation and expiry cleanup, persisted through
//!   Sea-ORM ([`SeaOrmStore`]) or held in memory ([`MemoryStore`])
//! - Fail-closed decisions: store outages and bad credentials never grant access
//! - A client-side guard mirroring the gate with single-flight claims refresh
//!   ([`ClientGuard`])
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{middleware, routing::get, Router};
//! use jobai_access_gate::{
//!     require_access, AccessGate, Connector, GateConfig, GateState, SeaOrmStore,
//!     SessionIssuer,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GateConfig::from_env()?;
//! let connector = Connector::lazy(Connector::options(
//!     config.database_url.clone().unwrap_or_default(),
//! ));
//! let store = Arc::new(SeaOrmStore::new(Arc::new(connector)));
//!
//! let issuer = SessionIssuer::from_config(&config, store.clone(), store.clone());
//! let gate = AccessGate::from_config(&config, store);
//!
//! let app: Router = Router::new()
//!     .route("/app/profile", get(|| async { "profile" }))
//!     .layer(middleware::from_fn_with_state(
//!         GateState::new(Arc::new(gate), config.cookie_name.clone()),
//!         require_access,
//!     ));
//! # Ok(())
//! # }
//! ```
//!
//! ## Decisions
//!
//! | Situation                                         | Result                       |
//! |---------------------------------------------------|------------------------------|
//! | public path                                       | continue                     |
//! | protected path, no valid credential               | `/login?redirect=<path>`     |
//! | verified path, email not verified                 | `/verify-email`              |
//! | subscriber path, subscription not `ACTIVE`        | `/subscription`              |
//! | session store unreachable                         | `/login?redirect=<path>`     |

pub mod access;
pub mod claims;
mod config;
mod db;
pub mod entity;
mod error;
pub mod gate;
pub mod guard;
mod issuer;
mod layer;
mod memory_store;
#[cfg(feature = "migration")]
pub mod migration;
pub mod notify;
mod seaorm_store;
mod store;
mod token;
pub mod validation;

pub use access::{AccessLevel, PathTable, Redirects};
pub use claims::{Claims, Role, SubscriptionStatus};
pub use config::GateConfig;
pub use db::Connector;
pub use error::{ConfigError, GateError, IssueError, StoreError, ValidationError};
pub use gate::{AccessGate, Decision, Outcome};
pub use guard::{ClaimsSource, ClientGuard, GuardAction, GuardState, RefreshOutcome};
pub use issuer::{clear_session_cookie, session_cookie, IssuedSession, SessionIssuer};
pub use layer::{credential_from_headers, require_access, GateState};
pub use memory_store::MemoryStore;
pub use notify::{ChannelSink, Notification, NotificationLevel, NotificationSink, TracingSink};
pub use seaorm_store::SeaOrmStore;
pub use store::{SessionRecord, SessionStore, UserDirectory, UserRecord};
pub use token::{TokenSigner, VerifiedCredential};
