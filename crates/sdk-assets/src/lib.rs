//! Pre-run generation of compiled Dart SDK assets for DDC-based tooling.
//!
//! Before a dependent test or build process runs, this crate checks that the
//! compiled SDK bundle, its source map, the full-dill archive, and the
//! outline summary exist on disk, and invokes the SDK's ahead-of-time
//! compiler tools to produce any that are missing. Tool output is staged in
//! a temporary directory and moved into place, so consumers never observe a
//! partially written asset.

pub mod error;
pub mod generator;
pub mod layout;
pub mod runner;

pub use error::{AssetError, Result};
pub use generator::{GeneratorOptions, SdkAssetGenerator};
pub use layout::{BundlePaths, ModuleFormat, SdkLayout};
pub use runner::{
    ProcessOutcome, ProcessRunner, StreamKind, ToolInvocation, ToolRunner, TranscriptLine,
};
