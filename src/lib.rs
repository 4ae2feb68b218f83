#![doc(html_root_url = "https://docs.rs/tsmarker/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsmarker - MPEG Transport Stream Inspector
//!
//! `tsmarker` reads a stream of 188-byte MPEG-2 transport stream frames in a
//! single pass, decodes every layer it understands and keeps per-PID
//! statistics. Optionally it splits the stream into one file per program.
//!
//! ## Features
//!
//! - Frame header and adaptation field decoding (PCR, OPCR, splicing,
//!   private data, adaptation extension)
//! - PSI sections: PAT, PMT, CAT, TSDT and private or unknown tables
//! - PES headers with PTS/DTS, ESCR, DSM trick mode and PES extension
//! - Continuity counter checking with duplicate tolerance
//! - Per-program splitting into `<pmt_pid>.m2ts` files
//! - Cancellable scans on tokio's blocking pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tsmarker::format::ts::{spawn_scan, Scanner};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let token = CancellationToken::new();
//!     let scanner = Scanner::open("capture.ts")?.with_cancellation(token.clone());
//!
//!     let report = spawn_scan(scanner).await??;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `format`: scan observer and sink traits, and the `ts` demultiplexer
//! - `error`: error and warning types
//! - `utils`: bit cursor and CRC-32/MPEG-2
//! - `config`: scan settings from files and environment

/// Scan settings
pub mod config;

/// Error types and utilities
pub mod error;

/// Transport stream decoding and scanning
pub mod format;

/// Common utilities and helper functions
pub mod utils;

pub use error::{Result, TsError, Warning};
