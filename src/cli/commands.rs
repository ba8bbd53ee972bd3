//! CLI command implementations.
//!
//! Each command returns its rendered output; the binary prints it.
//! Async work runs on a runtime created per command.

#![allow(clippy::format_push_string)]

use std::fmt::Write as FmtWrite;
use std::io::{self, Read, Write as IoWrite};
use std::path::{Path, PathBuf};

use crate::agent::classifier::KeywordHits;
use crate::agent::config::AgentConfig;
use crate::agent::orchestrator::Orchestrator;
use crate::agent::prompt::PromptSet;
use crate::agent::status::{StatusEvent, StatusObserver};
use crate::backend::snippets::{NewSnippet, SnippetFilter, SnippetStore};
use crate::cli::output::{
    OutputFormat, format_classification, format_query_result, format_snippet,
    format_snippet_list,
};
use crate::cli::parser::{Cli, Commands, SnippetCommands};
use crate::error::{CommandError, Result};

/// Parameters for the `ask` command.
#[derive(Debug, Clone, Default)]
pub struct AskParams<'a> {
    /// The question to answer.
    pub query: &'a str,
    /// Model for the synthesizer agent.
    pub model: Option<&'a str>,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<&'a Path>,
    /// Stream status events to stderr.
    pub verbose: bool,
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Ask {
            query,
            model,
            prompt_dir,
        } => {
            let params = AskParams {
                query,
                model: model.as_deref(),
                prompt_dir: prompt_dir.as_deref(),
                verbose: cli.verbose,
            };
            cmd_ask(&db_path, &params, format)
        }
        Commands::Classify { query } => Ok(cmd_classify(query, format)),
        Commands::Snippets(cmd) => execute_snippets(cmd, &db_path, format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

fn execute_snippets(cmd: &SnippetCommands, db_path: &Path, format: OutputFormat) -> Result<String> {
    match cmd {
        SnippetCommands::Init { force } => cmd_snippets_init(db_path, *force, format),
        SnippetCommands::Add {
            title,
            language,
            code,
            file,
            description,
            framework,
            category,
            difficulty,
            tags,
        } => {
            let code = read_code(code.as_deref(), file.as_deref())?;
            let snippet = NewSnippet {
                title: title.clone(),
                description: description.clone(),
                language: language.clone(),
                framework: framework.clone(),
                category: category.clone(),
                difficulty: difficulty.clone(),
                code,
                tags: tags.clone(),
            };
            cmd_snippets_add(db_path, &snippet, format)
        }
        SnippetCommands::List {
            language,
            category,
            framework,
            query,
            limit,
        } => {
            let mut filter = query
                .as_deref()
                .map(SnippetFilter::from_query)
                .unwrap_or_default();
            if language.is_some() {
                filter.language.clone_from(language);
            }
            if category.is_some() {
                filter.category.clone_from(category);
            }
            if framework.is_some() {
                filter.framework.clone_from(framework);
            }
            filter.limit = *limit;
            cmd_snippets_list(db_path, &filter, format)
        }
        SnippetCommands::Show { id } => cmd_snippets_show(db_path, *id, format),
        SnippetCommands::Stats => cmd_snippets_stats(db_path, format),
    }
}

// ==================== Ask ====================

fn cmd_ask(db_path: &Path, params: &AskParams<'_>, format: OutputFormat) -> Result<String> {
    if params.query.trim().is_empty() {
        return Err(CommandError::InvalidArgument("query must not be empty".to_string()).into());
    }

    let mut builder = AgentConfig::builder().snippet_db(db_path);
    if let Some(model) = params.model {
        builder = builder.synthesizer_model(model);
    }
    if let Some(dir) = params.prompt_dir {
        builder = builder.prompt_dir(dir);
    }
    let config = builder.from_env().build().map_err(|e| {
        CommandError::ExecutionFailed(format!("Agent configuration error: {e}"))
    })?;

    // Create tokio runtime as sync/async bridge
    let rt = tokio::runtime::Runtime::new().map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to create async runtime: {e}"))
    })?;

    let stderr_observer = |event: &StatusEvent| {
        let _ = writeln!(io::stderr().lock(), "{event}");
    };
    let observer: Option<&dyn StatusObserver> = if params.verbose {
        Some(&stderr_observer)
    } else {
        None
    };

    // The span exporter is spawned onto the runtime at build time.
    let orchestrator = {
        let _guard = rt.enter();
        Orchestrator::from_config(&config)
    }
    .map_err(|e| CommandError::ExecutionFailed(format!("Failed to build orchestrator: {e}")))?;

    let result = rt.block_on(async {
        let result = orchestrator.query(params.query, observer).await;
        orchestrator.flush().await;
        result
    });

    match result {
        Ok(query_result) => Ok(format_query_result(&query_result, format)),
        Err(e) => Err(CommandError::ExecutionFailed(format!("Query failed: {e}")).into()),
    }
}

// ==================== Classify ====================

fn cmd_classify(query: &str, format: OutputFormat) -> String {
    let hits = KeywordHits::scan(query);
    format_classification(&hits.decision(), &hits, format)
}

// ==================== Snippets ====================

fn cmd_snippets_init(db_path: &Path, force: bool, format: OutputFormat) -> Result<String> {
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Snippet database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }

    let store = SnippetStore::open(db_path)?;
    store.init()?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Initialized snippet database at: {}\n",
            db_path.display()
        )),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "success": true,
                "path": db_path.to_string_lossy(),
                "force": force
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_snippets_add(db_path: &Path, snippet: &NewSnippet, format: OutputFormat) -> Result<String> {
    let store = SnippetStore::open_existing(db_path)?;
    let id = store.insert(snippet)?;

    match format {
        OutputFormat::Text => Ok(format!("Added snippet #{id}: {}\n", snippet.title)),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "id": id,
                "title": snippet.title,
            });
            Ok(format.to_json(&json))
        }
    }
}

fn cmd_snippets_list(db_path: &Path, filter: &SnippetFilter, format: OutputFormat) -> Result<String> {
    let store = SnippetStore::open_existing(db_path)?;
    let snippets = store.search(filter)?;
    Ok(format_snippet_list(&snippets, format))
}

fn cmd_snippets_show(db_path: &Path, id: i64, format: OutputFormat) -> Result<String> {
    let store = SnippetStore::open_existing(db_path)?;
    let snippet = store.get(id)?;
    Ok(format_snippet(&snippet, format))
}

fn cmd_snippets_stats(db_path: &Path, format: OutputFormat) -> Result<String> {
    let store = SnippetStore::open_existing(db_path)?;
    let total = store.count()?;
    let languages = store.list_languages()?;
    let categories = store.list_categories()?;

    match format {
        OutputFormat::Text => {
            let mut out = format!("Snippets: {total}\n");
            for (title, groups) in [("Languages", &languages), ("Categories", &categories)] {
                if groups.is_empty() {
                    continue;
                }
                let _ = writeln!(out, "\n{title}:");
                for (name, n) in groups {
                    let _ = writeln!(out, "  {name:<16} {n}");
                }
            }
            Ok(out)
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let to_map = |groups: &[(String, usize)]| -> serde_json::Map<String, serde_json::Value> {
                groups
                    .iter()
                    .map(|(name, n)| (name.clone(), serde_json::Value::from(*n)))
                    .collect()
            };
            let json = serde_json::json!({
                "total": total,
                "languages": to_map(&languages),
                "categories": to_map(&categories),
            });
            Ok(format.to_json(&json))
        }
    }
}

/// Resolves snippet code from `--code`, `--file`, or stdin.
fn read_code(code: Option<&str>, file: Option<&Path>) -> Result<String> {
    let code = match (code, file) {
        (Some(code), _) => code.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to read {}: {e}", path.display()))
        })?,
        (None, None) => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    if code.trim().is_empty() {
        return Err(CommandError::InvalidArgument("snippet code is empty".to_string()).into());
    }
    Ok(code)
}

// ==================== Prompts ====================

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed(
                "Could not determine home directory for default prompt path".to_string(),
            )
        })?;

    let written = PromptSet::write_defaults(&target_dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Failed to write prompt templates: {e}"))
    })?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ))
            } else {
                let mut output = format!(
                    "Wrote {} prompt template(s) to: {}\n",
                    written.len(),
                    target_dir.display()
                );
                for path in &written {
                    let _ = writeln!(
                        output,
                        "  {}",
                        path.file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or("unknown")
                    );
                }
                output.push_str("\nEdit these files to customize the synthesizer prompt.\n");
                Ok(output)
            }
        }
        OutputFormat::Json | OutputFormat::Ndjson => {
            let json = serde_json::json!({
                "directory": target_dir.to_string_lossy(),
                "written": written.iter().map(|p| p.to_string_lossy().into_owned()).collect::<Vec<_>>(),
                "count": written.len()
            });
            Ok(format.to_json(&json))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, StorageError};
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let db_path = temp_dir.path().join("snippets.db");
        (temp_dir, db_path)
    }

    fn sample(title: &str, language: &str, category: &str) -> NewSnippet {
        NewSnippet {
            title: title.to_string(),
            description: format!("{title} in {language}"),
            language: language.to_string(),
            category: Some(category.to_string()),
            code: "print('hi')".to_string(),
            ..NewSnippet::default()
        }
    }

    fn seeded() -> (TempDir, PathBuf) {
        let (dir, db_path) = setup();
        cmd_snippets_init(&db_path, false, OutputFormat::Text).unwrap_or_else(|_| unreachable!());
        for snippet in [
            sample("Connect to Oracle", "python", "database"),
            sample("Binary search", "java", "algorithm"),
            sample("Insert rows", "python", "database"),
        ] {
            cmd_snippets_add(&db_path, &snippet, OutputFormat::Text)
                .unwrap_or_else(|_| unreachable!());
        }
        (dir, db_path)
    }

    #[test]
    fn test_snippets_init() {
        let (_temp_dir, db_path) = setup();
        let result = cmd_snippets_init(&db_path, false, OutputFormat::Text);
        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_snippets_init_already_exists() {
        let (_temp_dir, db_path) = setup();
        cmd_snippets_init(&db_path, false, OutputFormat::Text).unwrap_or_else(|_| unreachable!());

        assert!(cmd_snippets_init(&db_path, false, OutputFormat::Text).is_err());
        assert!(cmd_snippets_init(&db_path, true, OutputFormat::Text).is_ok());
    }

    #[test]
    fn test_add_requires_init() {
        let (_temp_dir, db_path) = setup();
        let result = cmd_snippets_add(&db_path, &sample("t", "rust", "misc"), OutputFormat::Text);
        assert!(matches!(result, Err(Error::Storage(StorageError::NotInitialized))));
    }

    #[test]
    fn test_add_and_show() {
        let (_temp_dir, db_path) = seeded();
        let out = cmd_snippets_show(&db_path, 2, OutputFormat::Text).unwrap_or_default();
        assert!(out.starts_with("#2 Binary search\n"));
        assert!(out.contains("Language: java"));
    }

    #[test]
    fn test_show_missing() {
        let (_temp_dir, db_path) = seeded();
        let result = cmd_snippets_show(&db_path, 99, OutputFormat::Text);
        assert!(matches!(result, Err(Error::Storage(StorageError::NotFound(99)))));
    }

    #[test]
    fn test_list_filters_by_language() {
        let (_temp_dir, db_path) = seeded();
        let filter = SnippetFilter {
            language: Some("python".to_string()),
            ..SnippetFilter::default()
        };
        let out = cmd_snippets_list(&db_path, &filter, OutputFormat::Json).unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_default();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_stats_json() {
        let (_temp_dir, db_path) = seeded();
        let out = cmd_snippets_stats(&db_path, OutputFormat::Json).unwrap_or_default();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_default();
        assert_eq!(value["total"], 3);
        assert_eq!(value["languages"]["python"], 2);
        assert_eq!(value["categories"]["algorithm"], 1);
    }

    #[test]
    fn test_classify_single_agent() {
        let out = cmd_classify("explain the concept of closures", OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_default();
        assert_eq!(value["decision"], serde_json::json!(["doc_search"]));
        assert_eq!(value["keywords"]["code"], serde_json::json!([]));
    }

    #[test]
    fn test_ask_rejects_blank_query() {
        let (_temp_dir, db_path) = setup();
        let params = AskParams {
            query: "   ",
            ..AskParams::default()
        };
        let result = cmd_ask(&db_path, &params, OutputFormat::Text);
        assert!(matches!(result, Err(Error::Command(CommandError::InvalidArgument(_)))));
    }

    #[test]
    fn test_read_code_prefers_inline() {
        let code = read_code(Some("fn main() {}"), None).unwrap_or_default();
        assert_eq!(code, "fn main() {}");
        assert!(read_code(Some("  \n"), None).is_err());
    }

    #[test]
    fn test_init_prompts_does_not_overwrite() {
        let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let first = cmd_init_prompts(Some(temp_dir.path()), OutputFormat::Text).unwrap_or_default();
        assert!(first.contains("Wrote 1 prompt template(s)"));
        let second = cmd_init_prompts(Some(temp_dir.path()), OutputFormat::Text).unwrap_or_default();
        assert!(second.contains("already exist"));
    }
}
