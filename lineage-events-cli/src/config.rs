//! Configuration loading and parsing

use anyhow::{bail, Context, Result};
use lineage_events::SelectionConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    /// One tracking graph (JSON) per position
    #[serde(default)]
    pub graphs: Vec<PathBuf>,
    /// Stop starting new positions after the first failure
    #[serde(default)]
    pub fail_fast: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    pub output_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Txt,
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    // Graph paths are relative to the config file
    if let Some(base) = path.parent() {
        for graph in &mut config.input.graphs {
            if graph.is_relative() {
                *graph = base.join(&*graph);
            }
        }
    }

    Ok(config)
}

impl AppConfig {
    /// Check that the configuration can be run
    pub fn validate(&self) -> Result<()> {
        if self.input.graphs.is_empty() {
            bail!("No input graphs given (use --graph or [input] graphs)");
        }
        if self.output.format == OutputFormat::Json && self.output.output_dir.is_none() {
            bail!("JSON output needs an output directory (use --output-dir or [output] output_dir)");
        }
        self.selection
            .validate()
            .context("Invalid [selection] settings")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_events::TransitionSpec;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            graphs = ["position_0001.json", "position_0002.json"]

            [selection]
            transitions = [[0, 1]]
            backward_range = 4
            forward_range = 8
            forward_labels = [1, 2]
            forward_check = 3
            max_out_degree = 2

            [output]
            format = "json"
            output_dir = "events"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.graphs.len(), 2);
        assert_eq!(config.selection.transitions, TransitionSpec::Pairs(vec![(0, 1)]));
        assert_eq!(config.selection.max_length(), Some(12));
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_text_transitions_and_defaults() {
        let toml_content = r#"
            [input]
            graphs = ["a.json"]

            [selection]
            transitions = "(1,2), (2,3)"
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.output.format, OutputFormat::Txt);
        assert_eq!(config.selection.transitions.resolve().unwrap().len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_incomplete_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.input.graphs.push(PathBuf::from("a.json"));
        config.selection = SelectionConfig::new().with_transition_text("(0,1,2)");
        assert!(config.validate().is_err());

        config.selection = SelectionConfig::new().add_transition(0, 1);
        config.output.format = OutputFormat::Json;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_resolves_graph_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[input]\ngraphs = [\"pos1.json\"]\n[selection]\ntransitions = \"0,1\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.input.graphs[0], dir.path().join("pos1.json"));
    }

    #[test]
    fn test_load_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
