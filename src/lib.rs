//! Vigil server — encrypted audit ingestion, anomaly analysis, and
//! intrusion response for a monitored VM fleet.
//!
//! Modular structure:
//! - [`crypto`] — Channel (AEAD) and at-rest envelope encryption
//! - [`keystore`] — Password-protected symmetric key store
//! - [`store`] — Audits, alerts, agent directory, inbound spool
//! - [`telemetry`] — Category tags and payload shapes
//! - [`ingest`] — The ingestion pipeline
//! - [`analyzers`] — Category analyzers and the analysis engine
//! - [`alert`] — Alert model and persist-then-notify dispatch
//! - [`notify`] — Operator mail
//! - [`response`] — Intrusion response state machine and worker
//! - [`logging`] — Structured JSON logging

pub mod alert;
pub mod analyzers;
pub mod config;
pub mod crypto;
pub mod error;
pub mod ingest;
pub mod keystore;
pub mod logging;
pub mod notify;
pub mod response;
pub mod store;
pub mod telemetry;

pub use alert::{Alert, AlertDispatcher, AlertKind, Importance};
pub use analyzers::{Analyzer, AnalyzerEngine, AnalyzerRegistry};
pub use config::ServerConfig;
pub use ingest::{IngestRequest, IngestService};
pub use keystore::SecretStore;
pub use logging::StructuredLogger;
pub use notify::{Notifier, SmtpMailer};
pub use response::{IntrusionResponder, ResponseOutcome};
pub use store::{Agent, Audit, Database};
