use std::collections::{BTreeSet, HashMap};

use context_vector_store::is_stop_word;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::query_classifier::{query_terms, Intent, QueryClassifier};

/// Topic areas that pull in their own vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Web,
    DevOps,
    Data,
    Security,
    Testing,
    Installation,
}

impl Domain {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::DevOps => "devops",
            Self::Data => "data",
            Self::Security => "security",
            Self::Testing => "testing",
            Self::Installation => "installation",
        }
    }

    /// Vocabulary appended when the domain is detected
    #[must_use]
    pub const fn terms(self) -> &'static [&'static str] {
        match self {
            Self::Web => &["http", "frontend", "backend", "endpoint"],
            Self::DevOps => &["deployment", "pipeline", "container", "infrastructure"],
            Self::Data => &["database", "schema", "query", "storage"],
            Self::Security => &["authentication", "authorization", "encryption", "credentials"],
            Self::Testing => &["test", "assertion", "fixture", "coverage"],
            Self::Installation => &["setup", "dependencies", "requirements", "installer"],
        }
    }
}

static DOMAIN_PATTERNS: Lazy<Vec<(Domain, Regex)>> = Lazy::new(|| {
    [
        (
            Domain::Web,
            r"(?i)\b(web|http|https|html|css|frontend|backend|browser|endpoint|rest|react|url)\b",
        ),
        (
            Domain::DevOps,
            r"(?i)\b(deploy\w*|docker|kubernetes|k8s|ci|cd|pipeline|container\w*|terraform|ansible)\b",
        ),
        (
            Domain::Data,
            r"(?i)\b(data|database|sql|schema|table|csv|etl|query|queries|migration\w*)\b",
        ),
        (
            Domain::Security,
            r"(?i)\b(auth\w*|security|secure|token|password|encrypt\w*|credential\w*|permission\w*|ssl|tls)\b",
        ),
        (
            Domain::Testing,
            r"(?i)\b(test\w*|spec|assert\w*|mock\w*|fixture\w*|coverage|pytest|unittest)\b",
        ),
        (
            Domain::Installation,
            r"(?i)\b(install\w*|setup|bootstrap|requirements|dependenc\w*|prerequisite\w*|pip|npm)\b",
        ),
    ]
    .into_iter()
    .filter_map(|(domain, pattern)| match Regex::new(pattern) {
        Ok(regex) => Some((domain, regex)),
        Err(err) => {
            log::warn!("Skipping {} domain pattern: {err}", domain.as_str());
            None
        }
    })
    .collect()
});

/// Domains whose pattern matches the query, in declaration order
#[must_use]
pub fn detect_domains(query: &str) -> Vec<Domain> {
    DOMAIN_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(query))
        .map(|(domain, _)| *domain)
        .collect()
}

/// Deduplicated term set produced by [`QueryExpander::expand`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedQuery {
    terms: BTreeSet<String>,
}

impl ExpandedQuery {
    #[must_use]
    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    /// Space-joined terms in sorted order
    #[must_use]
    pub fn to_query_string(&self) -> String {
        self.terms().collect::<Vec<_>>().join(" ")
    }
}

/// Everything derived from the raw query text before ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    pub query: String,
    pub intent: Intent,
    pub key_terms: Vec<String>,
    pub domains: Vec<Domain>,
    /// Original query first
    pub variants: Vec<String>,
}

/// Synonym and domain-vocabulary expansion of free-text queries
pub struct QueryExpander {
    /// term -> related terms, most relevant first
    synonyms: HashMap<String, Vec<String>>,
    max_synonyms_per_term: usize,
    max_key_terms: usize,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryExpander {
    /// Create an expander with the built-in synonym groups
    #[must_use]
    pub fn new() -> Self {
        let mut synonyms = HashMap::new();
        let mut group = |terms: &[&str], related: &[&str]| {
            for term in terms {
                synonyms.insert(
                    (*term).to_string(),
                    related.iter().map(|s| (*s).to_string()).collect::<Vec<_>>(),
                );
            }
        };

        // Development
        group(&["code", "implementation", "implement"], &["function", "module", "source"]);
        group(&["function", "method"], &["function", "method", "procedure"]);
        group(&["bug", "fix", "error"], &["issue", "fix", "error"]);
        group(&["enhance", "improve"], &["improve", "update", "extend"]);
        group(&["script", "scripts"], &["automation", "shell", "batch"]);
        group(&["build", "compile"], &["compile", "build", "make"]);

        // Configuration
        group(&["config", "configuration", "settings"], &["configuration", "settings", "options"]);
        group(&["env", "environment"], &["environment", "variables", "settings"]);

        // Installation
        group(&["install", "installation"], &["setup", "installation", "installer"]);
        group(&["setup"], &["install", "configure", "bootstrap"]);
        group(&["dependency", "dependencies"], &["requirements", "packages", "libraries"]);

        // Testing
        group(&["test", "tests", "testing"], &["test", "spec", "verification"]);

        // Security
        group(&["auth", "authentication", "login"], &["authentication", "login", "credentials"]);

        // Documentation
        group(&["docs", "documentation", "readme"], &["documentation", "guide", "readme"]);
        group(&["guide", "tutorial"], &["tutorial", "walkthrough", "howto"]);
        group(&["explain", "overview"], &["description", "overview", "summary"]);

        // Task management
        group(&["task", "todo", "ticket"], &["todo", "ticket", "issue"]);
        group(&["plan", "roadmap", "milestone"], &["roadmap", "milestone", "schedule"]);
        group(&["progress", "status"], &["status", "progress", "tracking"]);

        // Performance
        group(&["performance", "optimize", "slow"], &["optimization", "latency", "speed"]);

        // Data
        group(&["database", "db", "sql"], &["database", "query", "schema"]);

        Self {
            synonyms,
            max_synonyms_per_term: 3,
            max_key_terms: 4,
        }
    }

    #[must_use]
    pub fn with_limits(mut self, max_synonyms_per_term: usize, max_key_terms: usize) -> Self {
        self.max_synonyms_per_term = max_synonyms_per_term;
        self.max_key_terms = max_key_terms.max(1);
        self
    }

    /// Related terms for `term`, excluding the term itself, capped per term
    #[must_use]
    pub fn synonyms(&self, term: &str) -> Vec<&str> {
        self.synonyms
            .get(term)
            .map(|related| {
                related
                    .iter()
                    .map(String::as_str)
                    .filter(|s| *s != term)
                    .take(self.max_synonyms_per_term)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Union of the query terms, their synonyms, an intent hint and the
    /// vocabulary of every detected domain.
    #[must_use]
    pub fn expand(&self, query: &str, intent: Intent) -> ExpandedQuery {
        let mut terms = BTreeSet::new();
        for term in query_terms(query) {
            for synonym in self.synonyms(&term) {
                terms.insert(synonym.to_string());
            }
            terms.insert(term);
        }
        if terms.is_empty() {
            return ExpandedQuery::default();
        }

        let hint: &[&str] = match intent {
            Intent::Technical => &["implementation"],
            Intent::Documentation => &["documentation", "guide"],
            Intent::TaskManagement => &["task", "plan"],
            Intent::Mixed | Intent::General => &[],
        };
        terms.extend(hint.iter().map(|s| (*s).to_string()));

        for domain in detect_domains(query) {
            terms.extend(domain.terms().iter().map(|s| (*s).to_string()));
        }

        ExpandedQuery { terms }
    }

    /// Query terms with stop words removed, capped
    #[must_use]
    pub fn key_terms(&self, query: &str) -> Vec<String> {
        query_terms(query)
            .into_iter()
            .filter(|term| !is_stop_word(term))
            .take(self.max_key_terms)
            .collect()
    }

    /// Ordered, deduplicated query variants, original first, at most `max_variants`.
    #[must_use]
    pub fn generate_variants(&self, query: &str, max_variants: usize) -> Vec<String> {
        self.analyze(query, max_variants).variants
    }

    #[must_use]
    pub fn analyze(&self, query: &str, max_variants: usize) -> QueryAnalysis {
        let intent = QueryClassifier::classify(query);
        let key_terms = self.key_terms(query);
        let domains = detect_domains(query);

        let mut candidates = Vec::with_capacity(5);
        candidates.push(query.trim().to_string());
        candidates.push(self.expand(query, intent).to_query_string());

        if intent == Intent::Technical {
            let core: Vec<String> = query_terms(query)
                .into_iter()
                .filter(|term| QueryClassifier::is_technical_term(term))
                .collect();
            candidates.push(core.join(" "));
        }

        if let Some(domain) = domains.first() {
            let mut words = key_terms.clone();
            for term in domain.terms() {
                if !words.iter().any(|w| w == term) {
                    words.push((*term).to_string());
                }
            }
            candidates.push(words.join(" "));
        }

        candidates.push(key_terms.join(" "));

        let mut variants: Vec<String> = Vec::with_capacity(max_variants);
        let mut seen: BTreeSet<String> = BTreeSet::new();
        for candidate in candidates {
            if variants.len() >= max_variants {
                break;
            }
            let normalized = normalize(&candidate);
            if normalized.is_empty() || !seen.insert(normalized) {
                continue;
            }
            variants.push(candidate);
        }

        QueryAnalysis {
            query: query.to_string(),
            intent,
            key_terms,
            domains,
            variants,
        }
    }
}

/// Case- and whitespace-insensitive form used for variant dedup
fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
