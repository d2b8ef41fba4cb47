//! TestWorld pattern for isolated integration test environments.

use anyhow::Result;
use assert_cmd::Command;
use forkline_runtime::{Config, Delivery, SyncEngine, Workspace};
use forkline_store::{ActivityLog, Store};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use crate::surface::RecordingSurface;
use crate::transcript::TranscriptWriter;

/// Isolated data directory, transcript root and recording surface.
///
/// # Example
/// ```no_run
/// use forkline_testing::TestWorld;
///
/// let world = TestWorld::new();
/// let mut transcript = world.transcript("S1");
/// transcript.user("hello").unwrap();
/// let result = world.run(&["session", "show", "C1"]).unwrap();
/// assert!(!result.success());
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    data_dir: PathBuf,
    transcripts_root: PathBuf,
    config: Config,
    store: Arc<Store>,
    surface: Arc<RecordingSurface>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join(".forkline");
        let transcripts_root = temp_dir.path().join(".claude").join("projects");

        std::fs::create_dir_all(&data_dir).expect("Failed to create data dir");
        std::fs::create_dir_all(&transcripts_root).expect("Failed to create transcripts dir");

        let config = Config {
            transcripts_root: Some(transcripts_root.display().to_string()),
            workspace_url: "https://surface.test".to_string(),
            ..Config::default()
        };

        Self {
            store: Arc::new(Store::open(data_dir.join("sessions.json"))),
            temp_dir,
            data_dir,
            transcripts_root,
            config,
            surface: Arc::new(RecordingSurface::new()),
        }
    }

    /// Replace the configuration, e.g. to shorten intervals
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Config {
            transcripts_root: Some(self.transcripts_root.display().to_string()),
            ..config
        };
        self
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn transcripts_root(&self) -> &Path {
        &self.transcripts_root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn surface(&self) -> &Arc<RecordingSurface> {
        &self.surface
    }

    pub fn activity_log(&self) -> ActivityLog {
        self.workspace().activity_log()
    }

    pub fn workspace(&self) -> Workspace {
        Workspace {
            data_dir: self.data_dir.clone(),
            config: self.config.clone(),
        }
    }

    /// Write the configuration where the CLI will find it
    pub fn save_config(&self) -> Result<()> {
        self.config.save_to(&self.data_dir.join("config.toml"))?;
        Ok(())
    }

    pub fn delivery(&self) -> Delivery {
        Delivery::new(
            self.surface.clone(),
            self.surface.clone(),
            self.config.workspace_url.clone(),
        )
    }

    pub fn engine(&self) -> SyncEngine {
        SyncEngine::new(self.store.clone(), self.activity_log(), self.delivery())
    }

    /// Transcript writer for a session in the default project
    pub fn transcript(&self, session_id: &str) -> TranscriptWriter {
        let path = self
            .transcripts_root
            .join("-work-project")
            .join(format!("{}.jsonl", session_id));
        TranscriptWriter::new(path, session_id)
    }

    /// Configure a CLI command with this environment's data dir
    pub fn configure_command<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        self.configure_base(cmd).arg("--format").arg("plain")
    }

    /// Data dir, log level and cwd, without a default `--format`
    fn configure_base<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.arg("--data-dir")
            .arg(self.data_dir())
            .arg("--log-level")
            .arg("warn");
        cmd.current_dir(self.temp_dir.path());
        cmd
    }

    /// Run the `forkline` binary against this environment
    #[allow(deprecated)]
    pub fn run(&self, args: &[&str]) -> Result<CliResult> {
        let mut cmd = Command::cargo_bin("forkline")
            .map_err(|e| anyhow::anyhow!("Failed to find forkline binary: {}", e))?;
        // The CLI rejects a repeated --format, so only default it when absent
        if args.contains(&"--format") {
            self.configure_base(&mut cmd);
        } else {
            self.configure_command(&mut cmd);
        }
        cmd.args(args);

        let output = cmd.output()?;
        Ok(CliResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Result of a CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    pub status: std::process::ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CliResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }
}
