//! Minne - Video Archive with Grounded Answers
//!
//! A local-first tool for building a searchable archive out of screen
//! recordings.
//!
//! The name "Minne" comes from the Norwegian word for "memory."
//!
//! # Overview
//!
//! Minne allows you to:
//! - Ingest MKV screen recordings and transcode them for playback
//! - Transcribe recordings with speaker diarization
//! - Group transcripts into semantic chunks and index them for search
//! - Search the archive with combined lexical and vector retrieval
//! - Ask questions and get answers cited down to the timestamp
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `lifecycle` - Video status state machine
//! - `store` - SQLite persistence
//! - `media` - ffmpeg processing (remux, thumbnail, audio extraction)
//! - `transcription` - Speech-to-text transcription
//! - `chunking` - Semantic chunking of transcripts
//! - `embedding` - Embedding generation
//! - `search` - Hybrid search over indexed chunks
//! - `rag` - Question answering with citations
//! - `pipeline` - Ingestion pipeline coordination
//! - `document` - Summary document generation
//!
//! # Example
//!
//! ```rust,no_run
//! use minne::config::Settings;
//! use minne::rag::AnswerEngine;
//! use minne::search::{MemoryIndex, SearchIndex};
//! use minne::embedding::OpenAIEmbedder;
//! use minne::oracle::CliOracle;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let engine = AnswerEngine::new(
//!         Arc::new(MemoryIndex::new()),
//!         Arc::new(OpenAIEmbedder::new()),
//!         Arc::new(CliOracle::new(
//!             &settings.answer.command,
//!             settings.answer.args.clone(),
//!             settings.answer.timeout_secs,
//!         )),
//!         settings.search.limit,
//!     );
//!
//!     let answer = engine.ask("what did we decide about the rollout?").await?;
//!     println!("{}", answer.message);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod lifecycle;
pub mod media;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod rag;
pub mod search;
pub mod store;
pub mod transcription;

pub use error::{MinneError, Result};
