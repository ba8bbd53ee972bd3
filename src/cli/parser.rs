//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::agent::config::default_snippet_db;

/// code-assistant: ask coding questions across documentation and snippets.
///
/// Routes each question to a web documentation agent and/or a local
/// code-snippet agent, runs them concurrently, and synthesizes one answer.
#[derive(Parser, Debug)]
#[command(name = "code-assistant")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the code-snippet database.
    ///
    /// Defaults to `.code-assistant/snippets.db` in the current directory.
    #[arg(short, long, env = "CODE_ASSIST_SNIPPET_DB", global = true)]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolved snippet database path.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(default_snippet_db)
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a question and synthesize an answer from the routed agents.
    ///
    /// Requires `OPENAI_API_KEY` (or `CODE_ASSIST_API_KEY`); documentation
    /// search additionally needs `TAVILY_API_KEY`.
    #[command(after_help = r#"Examples:
  code-assistant ask "How do I connect to Oracle from Python?"
  code-assistant ask "show me a binary search in java" --verbose
  code-assistant --format json ask "explain async/await" | jq '.timing'
"#)]
    Ask {
        /// The question to answer.
        query: String,

        /// Model used for synthesis.
        #[arg(short, long)]
        model: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,
    },

    /// Show how a question would be routed, without calling any agent.
    #[command(after_help = r#"Examples:
  code-assistant classify "what is a closure"
  code-assistant --format json classify "sql insert example"
"#)]
    Classify {
        /// The question to classify.
        query: String,
    },

    /// Code-snippet database operations (init, add, list, show, stats).
    #[command(subcommand)]
    Snippets(SnippetCommands),

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are never overwritten.
    #[command(name = "init-prompts")]
    InitPrompts {
        /// Target directory (defaults to `~/.config/code-assistant/prompts`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

impl Commands {
    /// Command name as typed on the command line.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ask { .. } => "ask",
            Self::Classify { .. } => "classify",
            Self::Snippets(_) => "snippets",
            Self::InitPrompts { .. } => "init-prompts",
        }
    }
}

/// Snippet database subcommands.
#[derive(Subcommand, Debug)]
pub enum SnippetCommands {
    /// Create the snippet database schema.
    #[command(after_help = r#"Examples:
  code-assistant snippets init                    # Initialize default path
  code-assistant snippets init --force            # Recreate (destroys existing data)
  code-assistant --db-path ./my.db snippets init  # Initialize with custom path
"#)]
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Add a snippet.
    ///
    /// Code is read from `--code`, from `--file`, or from stdin.
    #[command(after_help = r#"Examples:
  code-assistant snippets add "Connect to Oracle" -l python --file connect.py -c database
  cat search.java | code-assistant snippets add "Binary search" -l java -t algorithm,search
"#)]
    Add {
        /// Short title.
        title: String,

        /// Programming language.
        #[arg(short, long)]
        language: String,

        /// Inline code.
        #[arg(long, conflicts_with = "file")]
        code: Option<String>,

        /// Read code from a file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// What the snippet demonstrates.
        #[arg(long, default_value = "")]
        description: String,

        /// Framework or library.
        #[arg(long)]
        framework: Option<String>,

        /// Category (defaults to `general`).
        #[arg(short, long)]
        category: Option<String>,

        /// Difficulty (defaults to `beginner`).
        #[arg(long)]
        difficulty: Option<String>,

        /// Comma-separated tags.
        #[arg(short, long, default_value = "")]
        tags: String,
    },

    /// List snippets, optionally filtered.
    #[command(after_help = r#"Examples:
  code-assistant snippets list
  code-assistant snippets list -l python -c database
  code-assistant snippets list --query "oracle connection pooling"
"#)]
    List {
        /// Filter by language.
        #[arg(short, long)]
        language: Option<String>,

        /// Filter by category.
        #[arg(short, long)]
        category: Option<String>,

        /// Filter by framework.
        #[arg(long)]
        framework: Option<String>,

        /// Derive filters from free-form text, as the code query agent does.
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum number of snippets.
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// Show one snippet.
    Show {
        /// Snippet ID.
        id: i64,
    },

    /// Show snippet counts per language and category.
    Stats,
}
