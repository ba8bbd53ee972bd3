//! Code-snippet database backend.
//!
//! Snippets live in a local SQLite file. The backend derives a
//! [`SnippetFilter`] from the query text (language, framework, keywords)
//! and returns matching rows as pretty-printed JSON.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Backend;
use crate::core::AgentId;
use crate::error::{BackendError, StorageError};

/// Default number of snippets returned per search.
pub const DEFAULT_LIMIT: usize = 5;

/// Hard cap on snippets returned per search.
pub const MAX_LIMIT: usize = 20;

/// Maximum length of any filter value.
const MAX_FILTER_LEN: usize = 100;

/// Maximum keywords extracted from a query.
const MAX_KEYWORDS: usize = 5;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS code_snippets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    language    TEXT NOT NULL,
    framework   TEXT,
    category    TEXT NOT NULL DEFAULT 'general',
    difficulty  TEXT NOT NULL DEFAULT 'beginner',
    code        TEXT NOT NULL,
    tags        TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_snippets_language ON code_snippets(language);
CREATE INDEX IF NOT EXISTS idx_snippets_category ON code_snippets(category);
";

const COLUMNS: &str =
    "id, title, description, language, framework, category, difficulty, code, tags, created_at";

/// Languages recognised in query text.
const LANGUAGES: &[&str] = &[
    "python",
    "java",
    "javascript",
    "typescript",
    "rust",
    "go",
    "sql",
    "plsql",
    "bash",
    "csharp",
];

/// Frameworks recognised in query text.
const FRAMEWORKS: &[&str] = &[
    "fastapi",
    "langchain",
    "langgraph",
    "flask",
    "django",
    "spring",
    "sqlalchemy",
    "oracledb",
    "react",
    "express",
];

/// Words that never become search keywords.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "how", "what", "why", "can", "you", "does", "show", "give",
    "code", "example", "examples", "snippet", "snippets", "sample", "samples", "implement",
    "implementation", "function", "write", "use", "using", "into", "from", "that", "this", "some",
    "need", "want", "please", "about", "best", "way", "are", "there", "any", "get", "make",
];

/// A stored code snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Row ID.
    pub id: i64,
    /// Short title.
    pub title: String,
    /// What the snippet demonstrates.
    pub description: String,
    /// Programming language.
    pub language: String,
    /// Framework or library, if any.
    pub framework: Option<String>,
    /// Category (for example `database`, `api`, `ai`).
    pub category: String,
    /// Difficulty label.
    pub difficulty: String,
    /// The code itself.
    pub code: String,
    /// Comma-separated tags.
    pub tags: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

impl Snippet {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            language: row.get(3)?,
            framework: row.get(4)?,
            category: row.get(5)?,
            difficulty: row.get(6)?,
            code: row.get(7)?,
            tags: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

/// A snippet to insert.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSnippet {
    /// Short title.
    pub title: String,
    /// What the snippet demonstrates.
    #[serde(default)]
    pub description: String,
    /// Programming language.
    pub language: String,
    /// Framework or library, if any.
    #[serde(default)]
    pub framework: Option<String>,
    /// Category.
    #[serde(default)]
    pub category: Option<String>,
    /// Difficulty label.
    #[serde(default)]
    pub difficulty: Option<String>,
    /// The code itself.
    pub code: String,
    /// Comma-separated tags.
    #[serde(default)]
    pub tags: String,
}

/// Search filter over the snippet table.
///
/// All set fields are AND-ed; keywords are OR-ed against title,
/// description, and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetFilter {
    /// Exact language match (case-insensitive).
    pub language: Option<String>,
    /// Exact category match (case-insensitive).
    pub category: Option<String>,
    /// Substring framework match (case-insensitive).
    pub framework: Option<String>,
    /// Keywords matched as substrings.
    pub keywords: Vec<String>,
    /// Maximum rows returned, clamped to `1..=MAX_LIMIT`.
    pub limit: usize,
}

impl Default for SnippetFilter {
    fn default() -> Self {
        Self {
            language: None,
            category: None,
            framework: None,
            keywords: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SnippetFilter {
    /// Derives a filter from free-form query text.
    ///
    /// The first recognised language and framework become filters; other
    /// significant words (three or more characters, not stopwords) become
    /// keywords.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let lower = query.to_lowercase();
        let mut filter = Self::default();

        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            if filter.language.is_none() && LANGUAGES.contains(&word) {
                filter.language = Some(word.to_string());
            } else if filter.framework.is_none() && FRAMEWORKS.contains(&word) {
                filter.framework = Some(word.to_string());
            } else if word.chars().count() >= 3
                && !STOPWORDS.contains(&word)
                && !LANGUAGES.contains(&word)
                && !FRAMEWORKS.contains(&word)
                && !filter.keywords.iter().any(|k| k == word)
                && filter.keywords.len() < MAX_KEYWORDS
            {
                filter.keywords.push(word.to_string());
            }
        }

        filter
    }

    fn clamped_limit(&self) -> usize {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

/// Trims and length-limits a filter value.
fn sanitize(value: &str) -> String {
    value.trim().chars().take(MAX_FILTER_LEN).collect()
}

/// Builds a `%value%` LIKE pattern with wildcards in `value` escaped.
fn like_pattern(value: &str) -> String {
    let escaped = sanitize(value)
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// SQLite-backed snippet storage.
pub struct SnippetStore {
    conn: Connection,
}

impl SnippetStore {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// Parent directories are created as required.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Opens an existing, initialized database without creating one.
    pub fn open_existing(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Err(StorageError::NotInitialized);
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        if !store.is_initialized()? {
            return Err(StorageError::NotInitialized);
        }
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Creates the schema if it does not exist.
    pub fn init(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Returns `true` if the snippet table exists.
    pub fn is_initialized(&self) -> Result<bool, StorageError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'code_snippets'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Inserts a snippet and returns its ID.
    pub fn insert(&self, snippet: &NewSnippet) -> Result<i64, StorageError> {
        self.conn.execute(
            "INSERT INTO code_snippets \
             (title, description, language, framework, category, difficulty, code, tags) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                snippet.title,
                snippet.description,
                snippet.language.to_lowercase(),
                snippet.framework.as_deref().map(str::to_lowercase),
                snippet.category.as_deref().unwrap_or("general"),
                snippet.difficulty.as_deref().unwrap_or("beginner"),
                snippet.code,
                snippet.tags,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetches one snippet by ID.
    pub fn get(&self, id: i64) -> Result<Snippet, StorageError> {
        self.conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM code_snippets WHERE id = ?1"),
                [id],
                Snippet::from_row,
            )
            .optional()?
            .ok_or(StorageError::NotFound(id))
    }

    /// Number of stored snippets.
    pub fn count(&self) -> Result<usize, StorageError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM code_snippets", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Searches snippets, newest first.
    pub fn search(&self, filter: &SnippetFilter) -> Result<Vec<Snippet>, StorageError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(language) = filter.language.as_deref() {
            values.push(sanitize(language));
            conditions.push(format!("LOWER(language) = LOWER(?{})", values.len()));
        }
        if let Some(category) = filter.category.as_deref() {
            values.push(sanitize(category));
            conditions.push(format!("LOWER(category) = LOWER(?{})", values.len()));
        }
        if let Some(framework) = filter.framework.as_deref() {
            values.push(like_pattern(framework));
            conditions.push(format!(
                "LOWER(COALESCE(framework, '')) LIKE LOWER(?{}) ESCAPE '\\'",
                values.len()
            ));
        }
        if !filter.keywords.is_empty() {
            let mut any = Vec::with_capacity(filter.keywords.len());
            for keyword in &filter.keywords {
                values.push(like_pattern(keyword));
                let n = values.len();
                any.push(format!(
                    "LOWER(title) LIKE LOWER(?{n}) ESCAPE '\\' \
                     OR LOWER(description) LIKE LOWER(?{n}) ESCAPE '\\' \
                     OR LOWER(tags) LIKE LOWER(?{n}) ESCAPE '\\'"
                ));
            }
            conditions.push(format!("({})", any.join(" OR ")));
        }

        let where_clause = if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        };

        let sql = format!(
            "SELECT {COLUMNS} FROM code_snippets WHERE {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT {}",
            filter.clamped_limit()
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), Snippet::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Languages with their snippet counts, most common first.
    pub fn list_languages(&self) -> Result<Vec<(String, usize)>, StorageError> {
        self.grouped_counts("language")
    }

    /// Categories with their snippet counts, most common first.
    pub fn list_categories(&self) -> Result<Vec<(String, usize)>, StorageError> {
        self.grouped_counts("category")
    }

    fn grouped_counts(&self, column: &'static str) -> Result<Vec<(String, usize)>, StorageError> {
        let sql = format!(
            "SELECT {column}, COUNT(*) AS n FROM code_snippets \
             GROUP BY {column} ORDER BY n DESC, {column} ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let n: i64 = row.get(1)?;
            Ok((row.get::<_, String>(0)?, usize::try_from(n).unwrap_or(0)))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl std::fmt::Debug for SnippetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnippetStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

/// Renders snippets for the synthesizer.
#[must_use]
pub fn render_snippets(snippets: &[Snippet]) -> String {
    if snippets.is_empty() {
        return "No matching code snippets found.".to_string();
    }
    serde_json::to_string_pretty(snippets).unwrap_or_else(|_| "[]".to_string())
}

/// Code-snippet query backend over a [`SnippetStore`] file.
///
/// `rusqlite::Connection` is `!Sync`, so each call opens its own
/// connection on the blocking pool.
#[derive(Debug, Clone)]
pub struct CodeSnippetSearch {
    db_path: PathBuf,
}

impl CodeSnippetSearch {
    /// Creates a backend reading from `db_path`.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

#[async_trait]
impl Backend for CodeSnippetSearch {
    fn id(&self) -> AgentId {
        AgentId::CodeQuery
    }

    fn name(&self) -> &'static str {
        "sqlite-snippets"
    }

    async fn invoke(&self, query: &str) -> Result<String, BackendError> {
        let path = self.db_path.clone();
        let filter = SnippetFilter::from_query(query);
        debug!(?filter, "searching code snippets");

        tokio::task::spawn_blocking(move || -> Result<String, BackendError> {
            let store = SnippetStore::open_existing(&path)?;
            let snippets = store.search(&filter)?;
            Ok(render_snippets(&snippets))
        })
        .await
        .map_err(|e| BackendError::Worker(e.to_string()))?
    }
}
