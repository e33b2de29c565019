//! # Lift Diagnostics
//!
//! Knowledge retrieval and diagnostic session engine for elevator-controller
//! fault diagnosis.
//!
//! Technicians ask free-text questions ("F01 02 ist aufgetreten, was ist
//! falsch?"). The engine selects the relevant error codes, parameters and
//! components from a structured knowledge base, sends them with the
//! conversation to an external reasoning engine, and parses the answer into
//! a citable [`DiagnosticResult`](models::DiagnosticResult). Technicians can
//! then judge the answer, and the feedback ledger tracks accuracy over time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌──────────────────┐
//! │ Knowledge    │──▶│ ContextBuilder │──▶│  SessionEngine   │──▶ ReasoningEngine
//! │ files (JSON) │   │  (per query)   │   │ (history, lock)  │◀──  (Anthropic)
//! └──────────────┘   └────────────────┘   └────────┬─────────┘
//!                                                  ▼
//!                                          ┌───────────────┐   ┌────────────────┐
//!                                          │ parser::parse │──▶│ FeedbackLedger │
//!                                          └───────────────┘   └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! liftdx summary                       # what is loaded
//! liftdx lookup "F01 02"               # exact lookup, no engine needed
//! liftdx ask "Was ist Fehlercode F01 02?"
//! liftdx feedback add --query "F01 02" --response "..." --judgment correct
//! liftdx serve                         # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed library errors |
//! | [`models`] | Core data types |
//! | [`loader`] | Knowledge file resolution and legacy schema mapping |
//! | [`knowledge`] | In-memory knowledge base and lookups |
//! | [`context`] | Per-query context selection |
//! | [`prompt`] | Instruction header and message template |
//! | [`engine`] | Reasoning engine abstraction |
//! | [`session`] | Multi-turn diagnostic sessions |
//! | [`parser`] | Structured extraction from answers |
//! | [`feedback`] | Feedback ledger and accuracy stats |
//! | [`lookup`] | `lookup` and `context` commands |
//! | [`ask`] | `ask` and `chat` commands |
//! | [`stats`] | Summary output |
//! | [`export`] | CSV export |
//! | [`server`] | JSON HTTP API |

pub mod ask;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod export;
pub mod feedback;
pub mod knowledge;
pub mod loader;
pub mod lookup;
pub mod models;
pub mod parser;
pub mod prompt;
pub mod server;
pub mod session;
pub mod stats;
