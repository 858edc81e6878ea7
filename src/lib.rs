//! # Style Corpus
//!
//! An incremental pipeline that turns a directory of writing samples into
//! grounding context for style-matched generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────┐   ┌─────────┐
//! │  corpus  │──▶│  processor  │──▶│ records  │──▶│ indexer │
//! │  *.txt   │   │ hash+title  │   │  *.json  │   │  embed  │
//! └──────────┘   └─────────────┘   └────┬─────┘   └────┬────┘
//!                                       │ sampling     ▼
//!                                       │         ┌──────────┐
//!                                       │         │  SQLite  │
//!                                       │         │  vectors │
//!                                       ▼         └────┬─────┘
//!                                 ┌───────────┐        │ retrieval
//!                                 │ assembler │◀───────┘
//!                                 └─────┬─────┘
//!                                       ▼
//!                                   compose
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! corpus init                   # create database
//! corpus process                # hash + title every changed document
//! corpus index                  # embed enriched records
//! corpus retrieve "sailing" --k 3
//! corpus compose "a short piece about autumn"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors |
//! | [`hasher`] | SHA-256 content digests |
//! | [`corpus`] | Source directory scan |
//! | [`records`] | Enriched record store |
//! | [`title`] | Title enrichment with fallback |
//! | [`processor`] | Incremental processing and hash backfill |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Text generation provider abstraction |
//! | [`store`] | Vector store (SQLite, in-memory) |
//! | [`indexer`] | Embedding indexer |
//! | [`retriever`] | Nearest-neighbor retrieval |
//! | [`assemble`] | Budgeted context assembly |
//! | [`compose`] | Style-grounded generation |
//! | [`app`] | Application context |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod app;
pub mod assemble;
pub mod compose;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod hasher;
pub mod http;
pub mod indexer;
pub mod migrate;
pub mod models;
pub mod processor;
pub mod progress;
pub mod records;
pub mod retriever;
pub mod store;
pub mod title;
