//! Generation pipeline: run-once gate, staging, and atomic install.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::{AssetError, Result};
use crate::layout::{ModuleFormat, SdkLayout};
use crate::runner::{ProcessRunner, ToolInvocation, ToolRunner};

/// Options accepted once, at construction.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Module format of the compiled bundle.
    pub module_format: ModuleFormat,
    /// Compile with the compiler's canary feature set.
    pub canary: bool,
    /// Pass `--verbose` to the summary worker.
    pub verbose: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            module_format: ModuleFormat::Amd,
            canary: false,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GenerationState {
    Pending,
    Done,
}

/// Ensures the compiled SDK assets exist, generating any that are missing.
///
/// Generation runs at most once per instance. Concurrent callers serialize
/// on the internal state lock; the first runs the pipeline and every later
/// call returns immediately, including after a failed attempt.
pub struct SdkAssetGenerator {
    layout: SdkLayout,
    options: GeneratorOptions,
    runner: Arc<dyn ToolRunner>,
    state: Mutex<GenerationState>,
}

impl SdkAssetGenerator {
    pub fn new(layout: SdkLayout, options: GeneratorOptions) -> Self {
        Self::with_runner(layout, options, Arc::new(ProcessRunner))
    }

    /// Construct with a custom runner (tests use this to observe spawns).
    pub fn with_runner(
        layout: SdkLayout,
        options: GeneratorOptions,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            layout,
            options,
            runner,
            state: Mutex::new(GenerationState::Pending),
        }
    }

    pub fn layout(&self) -> &SdkLayout {
        &self.layout
    }

    /// Generate every missing SDK asset.
    ///
    /// Steps whose outputs already exist on disk are skipped. Any step
    /// failure propagates to the caller and is not retried within this
    /// process lifetime.
    pub async fn generate(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state == GenerationState::Done {
            debug!("SDK assets already handled by this process, skipping");
            return Ok(());
        }
        // Flip before running so a failed attempt is never retried.
        *state = GenerationState::Done;

        self.ensure_compiled_sdk().await?;
        // Second pass re-checks the bundle outputs before the summary step.
        self.ensure_compiled_sdk().await?;
        self.ensure_sdk_summary().await?;

        Ok(())
    }

    /// Compiled bundle, source map, and full-dill archive.
    async fn ensure_compiled_sdk(&self) -> Result<()> {
        let bundle = self.layout.bundle(self.options.module_format);
        let expected = [
            bundle.js.clone(),
            bundle.js_map.clone(),
            self.layout.full_dill.clone(),
        ];
        if all_files_exist(&expected).await {
            debug!(format = %self.options.module_format, "Compiled SDK bundle is up to date");
            return Ok(());
        }

        info!(
            format = %self.options.module_format,
            js = %bundle.js.display(),
            "Generating compiled SDK bundle"
        );

        let staging = self.staging_dir()?;
        let staged_js = staging.path().join(&bundle.file_name);
        let staged_map = staging.path().join(bundle.map_file_name());
        let staged_dill = staging.path().join(bundle.dill_file_name());

        let mut args = vec![
            "--compile-sdk".to_string(),
            "--multi-root".to_string(),
            self.layout.root_uri(),
            "--multi-root-scheme".to_string(),
            "org-dartlang-sdk".to_string(),
            "--libraries-file".to_string(),
            "org-dartlang-sdk:///lib/libraries.json".to_string(),
            "--modules".to_string(),
            self.options.module_format.as_str().to_string(),
            "--sound-null-safety".to_string(),
            "dart:core".to_string(),
            "-o".to_string(),
            staged_js.display().to_string(),
        ];
        if self.options.canary {
            args.push("--canary".to_string());
        }

        self.run_tool("compiler", &self.layout.compiler, args).await?;

        self.install(&[
            (staged_js, bundle.js.clone()),
            (staged_map, bundle.js_map.clone()),
            (staged_dill, self.layout.full_dill.clone()),
        ])
        .await
        // `staging` is removed on drop, on every exit path above.
    }

    /// Outline summary produced by the kernel worker.
    async fn ensure_sdk_summary(&self) -> Result<()> {
        let expected = [self.layout.summary.clone()];
        if all_files_exist(&expected).await {
            debug!(path = %self.layout.summary.display(), "SDK summary is up to date");
            return Ok(());
        }

        info!(path = %self.layout.summary.display(), "Generating SDK summary");

        let staging = self.staging_dir()?;
        let summary_name = self
            .layout
            .summary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ddc_outline.dill".to_string());
        let staged_summary = staging.path().join(summary_name);

        let mut args = vec![
            "--target".to_string(),
            "ddc".to_string(),
            "--multi-root".to_string(),
            self.layout.root_uri(),
            "--multi-root-scheme".to_string(),
            "org-dartlang-sdk".to_string(),
            "--libraries-file".to_string(),
            "org-dartlang-sdk:///lib/libraries.json".to_string(),
            "--source".to_string(),
            "dart:core".to_string(),
            "--summary-only".to_string(),
            "--sound-null-safety".to_string(),
            "--output".to_string(),
            staged_summary.display().to_string(),
        ];
        if self.options.verbose {
            args.push("--verbose".to_string());
        }

        self.run_tool("worker", &self.layout.worker, args).await?;

        self.install(&[(staged_summary, self.layout.summary.clone())])
            .await
    }

    async fn run_tool(&self, tool: &str, program: &Path, args: Vec<String>) -> Result<()> {
        let invocation = ToolInvocation {
            program: program.to_path_buf(),
            args,
            cwd: self.layout.sdk_root.clone(),
        };
        let outcome = self.runner.run(&invocation).await?;
        if !outcome.success() {
            let transcript = outcome.render_transcript();
            error!(tool, code = outcome.code, %transcript, "Tool invocation failed");
            return Err(AssetError::ToolFailed {
                tool: tool.to_string(),
                code: outcome.code,
                transcript,
            });
        }
        Ok(())
    }

    fn staging_dir(&self) -> Result<TempDir> {
        // Staged under the SDK root so the install rename stays on one
        // filesystem and is an atomic move.
        let dir = tempfile::Builder::new()
            .prefix("sdk_assets_")
            .tempdir_in(&self.layout.sdk_root)?;
        Ok(dir)
    }

    /// Move staged files into their final destinations, in order, verifying
    /// each file before and after the move.
    async fn install(&self, moves: &[(PathBuf, PathBuf)]) -> Result<()> {
        for (staged, destination) in moves {
            if !is_file(staged).await {
                error!(path = %staged.display(), "Tool did not produce expected file");
                return Err(AssetError::MissingArtifact(staged.clone()));
            }
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).await?;
            }
            if is_file(destination).await {
                fs::remove_file(destination).await?;
            }
            fs::rename(staged, destination).await?;
            if !is_file(destination).await {
                error!(
                    staged = %staged.display(),
                    destination = %destination.display(),
                    "Installed file not found after move"
                );
                return Err(AssetError::InstallVerification {
                    source_path: staged.clone(),
                    destination: destination.clone(),
                });
            }
            debug!(path = %destination.display(), "Installed asset");
        }
        Ok(())
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// True only if every path is an existing regular file at check time. The
/// check takes no lock against other processes.
async fn all_files_exist(paths: &[PathBuf]) -> bool {
    for path in paths {
        if !is_file(path).await {
            return false;
        }
    }
    true
}
