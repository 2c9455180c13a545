//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::PathBuf;

use inkwell_config::{AppConfig, CommandDocConfig, ProcessorDocConfig};
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .max_turns(2)
///     .processor("BaseProcessor", &[("Log", "<Log>text</Log>")])
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("test-key".to_string());
        Self { config }
    }

    pub fn model(mut self, model: &str) -> Self {
        self.config.llm.model = model.to_string();
        self
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.config.llm.base_url = Some(url.to_string());
        self
    }

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.config.assistant.max_turns = turns;
        self
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.config.assistant.content_type = content_type.to_string();
        self
    }

    pub fn log_transcript(mut self, enabled: bool) -> Self {
        self.config.assistant.log_transcript = enabled;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    /// Add a catalog processor with `(command, example)` pairs.
    pub fn processor(mut self, name: &str, commands: &[(&str, &str)]) -> Self {
        self.config.catalog.processors.push(ProcessorDocConfig {
            name: name.to_string(),
            description: String::new(),
            commands: commands
                .iter()
                .map(|(command, example)| CommandDocConfig {
                    name: command.to_string(),
                    description: String::new(),
                    examples: vec![example.to_string()],
                })
                .collect(),
        });
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `toml_content` to `inkwell.toml` in a fresh temp directory.
///
/// The directory is deleted when the returned [`TempDir`] is dropped.
pub async fn write_temp_config(toml_content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let path = temp_dir.path().join("inkwell.toml");
    tokio::fs::write(&path, toml_content)
        .await
        .expect("failed to write test config");
    (temp_dir, path)
}
