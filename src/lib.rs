//! Bulk conversion of `.eml` message files into A4 PDF documents.
//!
//! The pipeline for one file is: parse the container with `mailparse`,
//! [`metadata::extract`] the From/To/Subject/Date headers,
//! [`body::select_body`] to build a markup fragment from the text parts,
//! [`document::assemble`] a single HTML document, then hand it to a
//! [`render::Renderer`]. [`batch::run_batch`] drives that over many files
//! and never stops on a single failure.

pub mod batch;
pub mod body;
pub mod convert;
pub mod decode;
pub mod document;
pub mod error;
pub mod metadata;
pub mod render;

pub use batch::{collect_inputs, output_path, run_batch, BatchObserver, BatchReport, Progress};
pub use convert::{message_to_html, ConversionResult, Converter};
pub use error::{ConvertError, ErrorKind, Result};
pub use metadata::EmailMetadata;
pub use render::{PageOptions, Renderer, WkHtmlToPdf};
