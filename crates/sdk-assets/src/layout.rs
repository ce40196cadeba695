use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AssetError, Result};

/// Module system the compiled SDK bundle targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// RequireJS-style AMD modules.
    Amd,
    /// DDC's native module loader.
    Ddc,
}

impl ModuleFormat {
    /// Value passed to the compiler's `--modules` option.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleFormat::Amd => "amd",
            ModuleFormat::Ddc => "ddc",
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleFormat {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "amd" => Ok(ModuleFormat::Amd),
            "ddc" => Ok(ModuleFormat::Ddc),
            other => Err(AssetError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Install locations for one compiled bundle variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlePaths {
    pub js: PathBuf,
    pub js_map: PathBuf,
    /// File name the compiler is asked to produce, e.g. `dart_sdk.js`.
    pub file_name: String,
}

impl BundlePaths {
    /// Name of the source map the compiler writes next to the bundle.
    pub fn map_file_name(&self) -> String {
        format!("{}.map", self.file_name)
    }

    /// Name of the full-dill archive the compiler writes next to the bundle.
    pub fn dill_file_name(&self) -> String {
        match self.file_name.strip_suffix(".js") {
            Some(stem) => format!("{stem}.dill"),
            None => format!("{}.dill", self.file_name),
        }
    }
}

/// Absolute paths describing one SDK installation.
///
/// Supplied by the caller and treated as read-only configuration for the
/// duration of generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkLayout {
    /// Root of the SDK checkout; tools run with this as their working
    /// directory.
    pub sdk_root: PathBuf,
    /// Bundle slots for the AMD module format.
    pub amd: BundlePaths,
    /// Bundle slots for DDC's native module format.
    pub ddc: BundlePaths,
    /// Full-dill archive produced alongside the compiled bundle.
    pub full_dill: PathBuf,
    /// Outline summary produced by the kernel worker.
    pub summary: PathBuf,
    /// AOT compiler snapshot.
    pub compiler: PathBuf,
    /// Kernel worker snapshot.
    pub worker: PathBuf,
}

impl SdkLayout {
    /// Conventional layout of a Dart SDK checkout rooted at `sdk_root`.
    pub fn standard(sdk_root: impl AsRef<Path>) -> Self {
        let root = sdk_root.as_ref().to_path_buf();
        let dev_compiler = root.join("lib/dev_compiler");
        Self {
            amd: BundlePaths {
                js: dev_compiler.join("amd/dart_sdk.js"),
                js_map: dev_compiler.join("amd/dart_sdk.js.map"),
                file_name: "dart_sdk.js".to_string(),
            },
            ddc: BundlePaths {
                js: dev_compiler.join("ddc/dart_sdk.js"),
                js_map: dev_compiler.join("ddc/dart_sdk.js.map"),
                file_name: "dart_sdk.js".to_string(),
            },
            full_dill: root.join("lib/_internal/ddc_platform.dill"),
            summary: root.join("lib/_internal/ddc_outline.dill"),
            compiler: root.join("bin/snapshots/dartdevc.dart.snapshot"),
            worker: root.join("bin/snapshots/kernel_worker.dart.snapshot"),
            sdk_root: root,
        }
    }

    /// Resolve the bundle install slots for `format`.
    pub fn bundle(&self, format: ModuleFormat) -> &BundlePaths {
        match format {
            ModuleFormat::Amd => &self.amd,
            ModuleFormat::Ddc => &self.ddc,
        }
    }

    /// `file://` URI of the SDK root, passed to the tools as the multi-root.
    pub fn root_uri(&self) -> String {
        // The tools expect a directory URI with a trailing slash.
        let mut uri = format!("file://{}", self.sdk_root.display());
        if !uri.ends_with('/') {
            uri.push('/');
        }
        uri
    }

    /// Read a layout description from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).map_err(|e| AssetError::InvalidLayout(e.to_string()))
    }
}
