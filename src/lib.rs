//! # chat-guardian
//!
//! A retrieval-augmented chat service with rule-based response guardrails.
//!
//! chat-guardian answers a conversation by retrieving semantically relevant
//! context from a document index, generating a reply through a pluggable
//! model backend, and passing the result through a safety/quality rule
//! engine before returning it with cited sources.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────┐   ┌───────────┐   ┌────────────┐
//! │  query  │──▶│ Retriever │──▶│ Formatter │──▶│ Generator  │
//! └─────────┘   │ embed+kNN │   │  prompt   │   │ mock/local │
//!               └─────┬─────┘   └───────────┘   │    /api    │
//!                     │ sources                 └─────┬──────┘
//!                     ▼                               ▼
//!               ┌───────────┐                  ┌────────────┐
//!               │  response │◀─────────────────│ Guardrails │
//!               │ + sources │                  │ safety/qlty│
//!               └───────────┘                  └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! guardian serve                       # start the HTTP server
//! guardian ask "What is RAG?"          # one-shot pipeline run
//! guardian check "some generated text" # guardrail report for a text
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration + startup env overrides |
//! | [`models`] | Conversation and wire types |
//! | [`index`] | Vector index abstraction, in-memory backend |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`retrieval`] | Query-time retrieval |
//! | [`prompt`] | Prompt assembly |
//! | [`generator`] | Generation backend abstraction |
//! | [`guardrails`] | Safety/quality rules + remediation |
//! | [`chat`] | Per-request orchestration |
//! | [`server`] | HTTP API |

pub mod chat;
pub mod config;
pub mod embedding;
pub mod generator;
pub mod guardrails;
pub mod index;
pub mod models;
pub mod prompt;
pub mod retrieval;
pub mod server;
