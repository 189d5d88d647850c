use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category of what a query is after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Implementation, scripts, configuration, tooling
    Technical,
    /// Guides, readmes, explanations
    Documentation,
    /// Plans, tickets, progress tracking
    TaskManagement,
    /// Technical and documentation signals tie
    Mixed,
    /// No recognizable signal
    General,
}

impl Intent {
    pub const ALL: [Self; 5] = [
        Self::Technical,
        Self::Documentation,
        Self::TaskManagement,
        Self::Mixed,
        Self::General,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Technical => "technical",
            Self::Documentation => "documentation",
            Self::TaskManagement => "task_management",
            Self::Mixed => "mixed",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const TECHNICAL_KEYWORDS: &[&str] = &[
    "api", "async", "bash", "batch", "bug", "build", "class", "cli", "code", "compile",
    "compiler", "config", "configuration", "crash", "database", "debug", "dependency",
    "deploy", "deployment", "docker", "enhance", "env", "error", "exception", "fix",
    "function", "implement", "implementation", "import", "install", "installation",
    "installer", "interface", "library", "linux", "macos", "method", "module", "optimize",
    "package", "performance", "powershell", "python", "query", "refactor", "runtime", "rust",
    "schema", "script", "sdk", "server", "setup", "shell", "sql", "struct", "test", "type",
    "variable", "windows",
];

const DOCUMENTATION_KEYWORDS: &[&str] = &[
    "changelog", "describe", "description", "doc", "docs", "documentation", "example",
    "examples", "explain", "explanation", "faq", "guide", "howto", "instructions", "intro",
    "introduction", "learn", "manual", "overview", "readme", "reference", "tutorial",
    "usage", "walkthrough", "wiki",
];

const TASK_KEYWORDS: &[&str] = &[
    "assign", "assignee", "backlog", "blocked", "deadline", "done", "epic", "issue",
    "milestone", "pending", "plan", "planning", "priority", "progress", "roadmap", "sprint",
    "status", "subtask", "task", "tasks", "ticket", "todo", "track", "tracking",
];

/// Per-category keyword hits for one query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntentCounts {
    pub technical: usize,
    pub documentation: usize,
    pub task_management: usize,
}

impl IntentCounts {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.technical + self.documentation + self.task_management
    }
}

pub struct QueryClassifier;

impl QueryClassifier {
    /// Classify a query by keyword overlap.
    ///
    /// Task keywords win when they are at least as frequent as either other
    /// category; equal technical and documentation counts yield [`Intent::Mixed`];
    /// a query with no hits at all is [`Intent::General`].
    #[must_use]
    pub fn classify(query: &str) -> Intent {
        let counts = Self::counts(query);
        if counts.total() == 0 {
            return Intent::General;
        }

        let IntentCounts {
            technical,
            documentation,
            task_management,
        } = counts;

        if task_management > 0 && task_management >= technical && task_management >= documentation
        {
            return Intent::TaskManagement;
        }
        if technical == documentation {
            return Intent::Mixed;
        }
        if technical > documentation {
            Intent::Technical
        } else {
            Intent::Documentation
        }
    }

    #[must_use]
    pub fn counts(query: &str) -> IntentCounts {
        let mut counts = IntentCounts::default();
        for term in query_terms(query) {
            if matches_keyword(TECHNICAL_KEYWORDS, &term) {
                counts.technical += 1;
            }
            if matches_keyword(DOCUMENTATION_KEYWORDS, &term) {
                counts.documentation += 1;
            }
            if matches_keyword(TASK_KEYWORDS, &term) {
                counts.task_management += 1;
            }
        }
        counts
    }

    #[must_use]
    pub fn is_technical_term(term: &str) -> bool {
        matches_keyword(TECHNICAL_KEYWORDS, &term.to_lowercase())
    }
}

/// Plural forms count as their singular keyword
fn matches_keyword(keywords: &[&str], term: &str) -> bool {
    if keywords.contains(&term) {
        return true;
    }
    term.len() > 3
        && term
            .strip_suffix('s')
            .is_some_and(|singular| keywords.contains(&singular))
}

/// Distinct lowercase alphanumeric query terms in first-seen order.
///
/// Identifiers are split on punctuation, so `setup_windows.bat` yields
/// `setup`, `windows` and `bat`. Single-character fragments are dropped.
#[must_use]
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for raw in query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
    {
        if !terms.iter().any(|t| t == raw) {
            terms.push(raw.to_string());
        }
    }
    terms
}
