use std::collections::HashSet;

use context_corpus::{Chunk, FileTypeCategory};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Restricts results by file category, extension or path glob.
///
/// Each entry is read as a glob when it contains glob metacharacters or a path
/// separator, as a category name when it names one (`code`, `docs`, ...), and
/// as an extension otherwise (`py` or `.py`). A chunk passes when any entry
/// matches. An empty filter passes everything.
#[derive(Debug, Clone, Default)]
pub struct FileTypeFilter {
    categories: HashSet<FileTypeCategory>,
    extensions: HashSet<String>,
    globs: Option<GlobSet>,
    invalid: Vec<String>,
}

fn is_glob_like(entry: &str) -> bool {
    entry.contains(['*', '?', '[', '{', '/'])
}

impl FileTypeFilter {
    #[must_use]
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        let mut filter = Self::default();
        let mut globs = GlobSetBuilder::new();
        let mut glob_count = 0usize;

        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if is_glob_like(entry) {
                match GlobBuilder::new(entry).literal_separator(true).build() {
                    Ok(glob) => {
                        globs.add(glob);
                        glob_count += 1;
                    }
                    Err(err) => {
                        log::warn!("Ignoring invalid file filter glob {entry:?}: {err}");
                        filter.invalid.push(entry.to_string());
                    }
                }
            } else if let Some(category) = FileTypeCategory::parse(entry) {
                filter.categories.insert(category);
            } else {
                filter
                    .extensions
                    .insert(entry.trim_start_matches('.').to_ascii_lowercase());
            }
        }

        if glob_count > 0 {
            match globs.build() {
                Ok(set) => filter.globs = Some(set),
                Err(err) => log::warn!("Ignoring file filter globs: {err}"),
            }
        }
        filter
    }

    /// No usable entries; everything passes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.extensions.is_empty() && self.globs.is_none()
    }

    /// Entries dropped because they were not valid globs
    #[must_use]
    pub fn invalid_entries(&self) -> &[String] {
        &self.invalid
    }

    #[must_use]
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if self.is_empty() {
            return true;
        }
        if self.categories.contains(&chunk.file_type_category) {
            return true;
        }
        if chunk
            .extension()
            .is_some_and(|ext| self.extensions.contains(&ext))
        {
            return true;
        }
        self.globs.as_ref().is_some_and(|set| {
            set.is_match(chunk.source_path.replace('\\', "/").trim_start_matches("./"))
        })
    }
}
