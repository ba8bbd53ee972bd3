//! System prompt and template builder for the synthesis stage.
//!
//! The system prompt can be overridden by a template file; the user
//! message is always assembled from the query and the backend outcomes.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::core::{AgentId, Outcomes};

/// System prompt for the synthesizer agent.
pub const SYNTHESIZER_SYSTEM_PROMPT: &str =
    "You are a helpful coding assistant synthesizing information for developers.";

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/code-assistant/prompts";

/// Filename for the synthesizer prompt template.
const SYNTHESIZER_FILENAME: &str = "synthesizer.md";

/// System prompts used by the engine.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for the synthesizer agent.
    pub synthesizer: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument
    /// 2. `CODE_ASSIST_PROMPT_DIR` environment variable
    /// 3. `~/.config/code-assistant/prompts/`
    ///
    /// A missing or blank file uses the default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("CODE_ASSIST_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            synthesizer: load_file(SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            synthesizer: SYNTHESIZER_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [(SYNTHESIZER_FILENAME, SYNTHESIZER_SYSTEM_PROMPT)];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Builds the synthesis user message from the query and backend outcomes.
///
/// Each section carries the successful text for its agent. Failed,
/// blank, or unrouted agents get the agent's placeholder; error details
/// never reach the model.
#[must_use]
pub fn build_synthesis_prompt(query: &str, outcomes: &Outcomes) -> String {
    let mut prompt = String::from(
        "Based on the user's question and the gathered information, \
         provide a comprehensive answer.\n\n",
    );
    let _ = write!(prompt, "**User Question:** {query}\n\n");

    for agent in AgentId::ALL {
        let body = outcomes
            .success_text(agent)
            .unwrap_or_else(|| agent.missing_placeholder());
        let _ = write!(prompt, "**{}:**\n{body}\n\n", agent.section_heading());
    }

    prompt.push_str(
        "**Your Task:**\n\
         Synthesize the above information into a helpful response that:\n\
         1. Explains the concept briefly (if docs available)\n\
         2. Shows relevant code examples (if code available)\n\
         3. Provides practical tips\n\
         4. Is well-formatted with headers and code blocks\n\n\
         Keep it concise but complete.",
    );

    prompt
}
