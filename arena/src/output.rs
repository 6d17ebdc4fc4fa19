//! Output formatting for CLI commands.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use arena_core::{ContentOrigin, TreeNode, Version};
use serde::Serialize;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write output using the configured format.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write raw bytes to stdout (text mode file contents).
    pub fn write_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut handle = self.stdout.lock();
        handle.write_all(bytes)?;
        handle.flush()?;
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error message directly.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

/// Render a content tree as an indented listing, directories suffixed `/`.
pub fn render_tree(nodes: &[TreeNode]) -> String {
    let mut out = String::new();
    render_level(nodes, 0, &mut out);
    out
}

fn render_level(nodes: &[TreeNode], depth: usize, out: &mut String) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match &node.children {
            Some(children) => {
                out.push_str(&format!("{}{}/\n", indent, node.name));
                render_level(children, depth + 1, out);
            }
            None => {
                out.push_str(&format!(
                    "{}{} ({} bytes)\n",
                    indent,
                    node.name,
                    node.size.unwrap_or(0)
                ));
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Output for `head` command.
#[derive(Debug, Serialize)]
pub struct HeadOutput {
    pub success: bool,
    pub result_code: u8,
    pub head: Option<String>,
}

/// Output for `versions` command.
#[derive(Debug, Serialize)]
pub struct VersionsOutput {
    pub success: bool,
    pub result_code: u8,
    pub head: Option<String>,
    pub versions: Vec<Version>,
}

/// Output for `switch` command.
#[derive(Debug, Serialize)]
pub struct SwitchOutput {
    pub success: bool,
    pub result_code: u8,
    pub previous_head: Option<String>,
    pub new_head: String,
}

/// Output for `tree` command.
#[derive(Debug, Serialize)]
pub struct TreeOutput {
    pub success: bool,
    pub result_code: u8,
    pub origin: ContentOrigin,
    pub root: String,
    pub tree: Vec<TreeNode>,
    pub file_count: usize,
    pub directory_count: usize,
}

/// Output for `cat` command.
#[derive(Debug, Serialize)]
pub struct CatOutput {
    pub success: bool,
    pub result_code: u8,
    pub path: String,
    pub content: String,
    pub size: u64,
}

/// Bundle entry for `extract` command.
#[derive(Debug, Clone, Serialize)]
pub struct BundleEntry {
    pub path: String,
    pub size: u64,
}

/// Output for `extract` command.
#[derive(Debug, Serialize)]
pub struct ExtractOutput {
    pub success: bool,
    pub result_code: u8,
    pub files: Vec<BundleEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_tree() {
        let nodes = vec![
            TreeNode::directory(
                "scenarios",
                "scenarios",
                vec![TreeNode::file("test.yaml", "scenarios/test.yaml", 3)],
            ),
            TreeNode::file("config.yaml", "config.yaml", 5),
        ];

        assert_eq!(
            render_tree(&nodes),
            "scenarios/\n  test.yaml (3 bytes)\nconfig.yaml (5 bytes)\n"
        );
    }
}
