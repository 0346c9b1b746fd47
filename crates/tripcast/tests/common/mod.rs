//! Common test utilities for tripcast integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated HOME so config never touches the real one
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let config_dir = temp_dir.path().join(".tripcast");

        Ok(Self {
            temp_dir,
            config_dir,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// Command with HOME pointed at the temp dir and overrides cleared
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tripcast"));
        cmd.env("HOME", self.temp_dir.path());
        for var in [
            "OPENAI_API_KEY",
            "OPENAI_API_BASE",
            "TRIPCAST_MODEL",
            "ALLOWED_ORIGINS",
            "TRIPCAST_PORT",
            "RUST_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Write a config file with the given JSON
    pub fn create_config(&self, config: serde_json::Value) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::write(self.config_file(), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
