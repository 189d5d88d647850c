use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Minimum trimmed text length (exclusive) for a chunk to be retrievable
pub const MIN_CHUNK_TEXT_LEN: usize = 10;

/// A retrievable fragment of the corpus with file/location metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The chunk content
    pub text: String,

    /// Source file path, relative to the indexed project root
    pub source_path: String,

    /// Semantic kind of the fragment
    pub chunk_type: ChunkType,

    /// Start line (1-indexed)
    pub start_line: usize,

    /// End line (1-indexed, inclusive)
    pub end_line: usize,

    /// Indexer confidence in [0, 1]
    pub confidence: f64,

    /// Bare file name (last path component)
    pub file_name: String,

    /// Category derived from the source path
    pub file_type_category: FileTypeCategory,

    /// Last modification time of the source file, when the indexer recorded it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    /// Query-scoped relevance, written on per-query copies only
    #[serde(default)]
    pub relevance_score: f64,

    /// Set by the context optimizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
}

impl Chunk {
    /// Create a chunk; file name and category are derived from `source_path`
    pub fn new(
        source_path: impl Into<String>,
        start_line: usize,
        end_line: usize,
        text: impl Into<String>,
        chunk_type: ChunkType,
    ) -> Self {
        let source_path = source_path.into();
        let file_name = file_name_of(&source_path);
        let file_type_category = FileTypeCategory::from_path(&source_path);
        Self {
            text: text.into(),
            source_path,
            chunk_type,
            start_line,
            end_line,
            confidence: 1.0,
            file_name,
            file_type_category,
            last_modified: None,
            relevance_score: 0.0,
            quality_score: None,
        }
    }

    /// Builder: set confidence (clamped to [0, 1], NaN becomes 0)
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence);
        self
    }

    /// Builder: set last modification time
    #[must_use]
    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    /// Builder: override the displayed file name
    #[must_use]
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Stable identity: source path plus line span
    #[must_use]
    pub fn id(&self) -> ChunkId {
        ChunkId {
            source_path: self.source_path.clone(),
            start_line: self.start_line,
            end_line: self.end_line,
        }
    }

    /// Number of lines covered
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Text length in characters
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the text is long enough to be worth retrieving
    #[must_use]
    pub fn has_retrievable_text(&self) -> bool {
        self.has_text_longer_than(MIN_CHUNK_TEXT_LEN)
    }

    /// Whether the trimmed text has more than `min_len` characters
    #[must_use]
    pub fn has_text_longer_than(&self, min_len: usize) -> bool {
        self.text.trim().chars().count() > min_len
    }

    /// Lowercased extension of the file name, if any
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Whether the source file sits at the project root
    #[must_use]
    pub fn is_root_level(&self) -> bool {
        let trimmed = self.source_path.trim_start_matches("./");
        !trimmed.contains('/') && !trimmed.contains('\\')
    }
}

/// Identity of a chunk across variants and snapshots
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId {
    pub source_path: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source_path, self.start_line, self.end_line)
    }
}

/// Kind of chunk as reported by the indexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// Standalone function
    Function,
    /// Method inside a class or impl
    Method,
    /// Class definition
    Class,
    /// Struct / record definition
    Struct,
    /// Module-level code
    Module,
    /// Documentation section or docstring
    Documentation,
    /// Comment block
    Comment,
    /// Configuration block
    Config,
    /// Shell/batch script body
    Script,
    /// Plain prose
    Text,
    /// Anything else
    Other,
}

impl ChunkType {
    /// Parse the record `type` field; unknown values map to `Other`
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "function" | "func" | "fn" | "def" | "function_definition" => Self::Function,
            "method" | "method_definition" => Self::Method,
            "class" | "class_definition" | "interface" | "trait" => Self::Class,
            "struct" | "enum" | "type" | "record" => Self::Struct,
            "module" | "impl" | "namespace" | "code" => Self::Module,
            "doc" | "docs" | "documentation" | "docstring" | "markdown" | "section"
            | "heading" => Self::Documentation,
            "comment" | "comments" => Self::Comment,
            "config" | "configuration" | "settings" => Self::Config,
            "script" | "shell" | "batch" => Self::Script,
            "text" | "paragraph" | "prose" => Self::Text,
            _ => Self::Other,
        }
    }

    /// Function/class-like definitions
    #[must_use]
    pub const fn is_definition(self) -> bool {
        matches!(
            self,
            Self::Function | Self::Method | Self::Class | Self::Struct
        )
    }

    /// Documentation-like prose blocks
    #[must_use]
    pub const fn is_documentation(self) -> bool {
        matches!(self, Self::Documentation | Self::Comment)
    }

    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Module => "module",
            Self::Documentation => "documentation",
            Self::Comment => "comment",
            Self::Config => "config",
            Self::Script => "script",
            Self::Text => "text",
            Self::Other => "other",
        }
    }
}

/// Coarse file category used by boost tables and diversity ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTypeCategory {
    Code,
    ConfigScript,
    Documentation,
    Task,
    Other,
}

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "pyi", "js", "jsx", "mjs", "cjs", "ts", "tsx", "go", "java", "kt", "kts", "c",
    "h", "cc", "cpp", "cxx", "hpp", "cs", "rb", "php", "swift", "scala", "lua", "dart", "vue",
    "svelte", "m", "r", "jl", "ex", "exs", "hs", "clj", "sql",
];

const CONFIG_SCRIPT_EXTENSIONS: &[&str] = &[
    "toml", "yaml", "yml", "json", "ini", "cfg", "conf", "env", "xml", "properties", "lock",
    "sh", "bash", "zsh", "fish", "bat", "cmd", "ps1", "psm1", "mk", "gradle", "dockerfile",
];

const CONFIG_SCRIPT_FILE_NAMES: &[&str] = &[
    "dockerfile",
    "makefile",
    "justfile",
    "procfile",
    "vagrantfile",
    ".env",
    ".gitignore",
    ".editorconfig",
];

const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "markdown", "rst", "txt", "adoc", "org", "rtf"];

/// Extensions a `task*` file may carry and still be a task list; code and scripts never are
const TASK_LIST_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "json", "org", "rst"];

fn is_task_list(stem: &str, ext: &str) -> bool {
    stem.starts_with("task") && TASK_LIST_EXTENSIONS.contains(&ext)
}

impl FileTypeCategory {
    /// All categories in table order
    pub const ALL: [Self; 5] = [
        Self::Code,
        Self::ConfigScript,
        Self::Documentation,
        Self::Task,
        Self::Other,
    ];

    /// Classify a source path
    #[must_use]
    pub fn from_path(source_path: &str) -> Self {
        let normalized = source_path.replace('\\', "/").to_ascii_lowercase();
        let file_name = normalized.rsplit('/').next().unwrap_or_default();
        let in_tasks_dir = normalized
            .split('/')
            .rev()
            .skip(1)
            .any(|component| component == "tasks" || component == ".tasks");
        if in_tasks_dir || file_name.ends_with(".task") {
            return Self::Task;
        }

        if CONFIG_SCRIPT_FILE_NAMES.contains(&file_name) {
            return Self::ConfigScript;
        }

        let stem = file_name.split('.').next().unwrap_or_default();
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return Self::Other;
        };
        if CODE_EXTENSIONS.contains(&ext) {
            Self::Code
        } else if is_task_list(stem, ext) {
            Self::Task
        } else if CONFIG_SCRIPT_EXTENSIONS.contains(&ext) {
            Self::ConfigScript
        } else if DOC_EXTENSIONS.contains(&ext) {
            Self::Documentation
        } else {
            Self::Other
        }
    }

    /// Parse a user-facing category name used in search filters
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "code" | "source" => Some(Self::Code),
            "config" | "script" | "config_script" | "configuration" | "scripts" => {
                Some(Self::ConfigScript)
            }
            "doc" | "docs" | "documentation" => Some(Self::Documentation),
            "task" | "tasks" => Some(Self::Task),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::ConfigScript => "config_script",
            Self::Documentation => "documentation",
            Self::Task => "task",
            Self::Other => "other",
        }
    }
}

/// Last path component of a source path
#[must_use]
pub fn file_name_of(source_path: &str) -> String {
    source_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_path)
        .to_string()
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_derives_file_metadata() {
        let chunk = Chunk::new(
            "scripts/setup_windows.bat",
            1,
            12,
            "@echo off\r\ncall install.bat",
            ChunkType::Script,
        );
        assert_eq!(chunk.file_name, "setup_windows.bat");
        assert_eq!(chunk.file_type_category, FileTypeCategory::ConfigScript);
        assert_eq!(chunk.extension().as_deref(), Some("bat"));
        assert!(!chunk.is_root_level());
        assert_eq!(chunk.line_count(), 12);
        assert_eq!(chunk.id().to_string(), "scripts/setup_windows.bat:1:12");
    }

    #[test]
    fn test_confidence_is_clamped() {
        let chunk = Chunk::new("a.py", 1, 2, "def a(): pass", ChunkType::Function);
        assert_eq!(chunk.clone().with_confidence(1.7).confidence, 1.0);
        assert_eq!(chunk.clone().with_confidence(-0.2).confidence, 0.0);
        assert_eq!(chunk.with_confidence(f64::NAN).confidence, 0.0);
    }

    #[test]
    fn test_retrievable_text_threshold() {
        let short = Chunk::new("a.md", 1, 1, "   tiny    ", ChunkType::Text);
        let exact = Chunk::new("a.md", 1, 1, "0123456789", ChunkType::Text);
        let long = Chunk::new("a.md", 1, 1, "0123456789a", ChunkType::Text);
        assert!(!short.has_retrievable_text());
        assert!(!exact.has_retrievable_text());
        assert!(long.has_retrievable_text());
    }

    #[test]
    fn test_category_from_path() {
        assert_eq!(FileTypeCategory::from_path("src/lib.rs"), FileTypeCategory::Code);
        assert_eq!(FileTypeCategory::from_path("app/main.py"), FileTypeCategory::Code);
        assert_eq!(
            FileTypeCategory::from_path("config/settings.yaml"),
            FileTypeCategory::ConfigScript
        );
        assert_eq!(
            FileTypeCategory::from_path("Dockerfile"),
            FileTypeCategory::ConfigScript
        );
        assert_eq!(
            FileTypeCategory::from_path("docs/README.md"),
            FileTypeCategory::Documentation
        );
        assert_eq!(
            FileTypeCategory::from_path("tasks/task_003.txt"),
            FileTypeCategory::Task
        );
        assert_eq!(
            FileTypeCategory::from_path(".taskmaster/tasks/tasks.json"),
            FileTypeCategory::Task
        );
        assert_eq!(
            FileTypeCategory::from_path("TASKS.md"),
            FileTypeCategory::Task
        );
        assert_eq!(FileTypeCategory::from_path("assets/logo.png"), FileTypeCategory::Other);
        assert_eq!(FileTypeCategory::from_path("LICENSE"), FileTypeCategory::Other);
    }

    #[test]
    fn test_task_prefix_does_not_override_code_or_config() {
        assert_eq!(
            FileTypeCategory::from_path("src/task_manager.py"),
            FileTypeCategory::Code
        );
        assert_eq!(FileTypeCategory::from_path("src/tasks.rs"), FileTypeCategory::Code);
        assert_eq!(
            FileTypeCategory::from_path("Taskfile.yml"),
            FileTypeCategory::ConfigScript
        );
        assert_eq!(
            FileTypeCategory::from_path("scripts/task_runner.sh"),
            FileTypeCategory::ConfigScript
        );
        assert_eq!(
            FileTypeCategory::from_path("task_list.json"),
            FileTypeCategory::Task
        );
        assert_eq!(
            FileTypeCategory::from_path("notes/task_003.txt"),
            FileTypeCategory::Task
        );
    }

    #[test]
    fn test_text_length_threshold_is_adjustable() {
        let chunk = Chunk::new("a.md", 1, 1, "  short text  ", ChunkType::Text);
        assert!(chunk.has_text_longer_than(5));
        assert!(!chunk.has_text_longer_than(10));
        assert!(!chunk.has_text_longer_than(40));
    }

    #[test]
    fn test_chunk_type_parse() {
        assert_eq!(ChunkType::parse("Function"), ChunkType::Function);
        assert_eq!(ChunkType::parse("docstring"), ChunkType::Documentation);
        assert_eq!(ChunkType::parse(" class "), ChunkType::Class);
        assert_eq!(ChunkType::parse("weird"), ChunkType::Other);
        assert!(ChunkType::Method.is_definition());
        assert!(ChunkType::Comment.is_documentation());
        assert!(!ChunkType::Config.is_definition());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(FileTypeCategory::parse("Docs"), Some(FileTypeCategory::Documentation));
        assert_eq!(FileTypeCategory::parse("script"), Some(FileTypeCategory::ConfigScript));
        assert_eq!(FileTypeCategory::parse("py"), None);
    }

    #[test]
    fn test_root_level_detection() {
        let root = Chunk::new("setup.sh", 1, 3, "#!/bin/sh\necho setup", ChunkType::Script);
        let dotted = Chunk::new("./install.bat", 1, 3, "@echo off\r\nrem", ChunkType::Script);
        assert!(root.is_root_level());
        assert!(dotted.is_root_level());
    }
}
