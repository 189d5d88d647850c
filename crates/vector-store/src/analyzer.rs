use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Tokens of two or more word characters, same shape as the classic scikit-style analyzer
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token pattern is valid"));

/// English function words removed before n-gram construction
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "an",
    "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are",
    "around", "as", "at", "be", "became", "because", "become", "becomes", "becoming", "been",
    "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing",
    "done", "down", "due", "during", "each", "eg", "either", "else", "elsewhere", "enough",
    "etc", "even", "ever", "every", "everyone", "everything", "everywhere", "except", "few",
    "for", "former", "formerly", "from", "further", "had", "has", "hasnt", "have", "having",
    "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers",
    "herself", "him", "himself", "his", "how", "however", "i", "ie", "if", "in", "indeed",
    "into", "is", "it", "its", "itself", "just", "last", "latter", "latterly", "least", "less",
    "ltd", "made", "many", "may", "me", "meanwhile", "might", "mine", "more", "moreover",
    "most", "mostly", "much", "must", "my", "myself", "namely", "neither", "never",
    "nevertheless", "next", "no", "nobody", "none", "noone", "nor", "not", "nothing", "now",
    "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other",
    "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "per", "perhaps",
    "please", "rather", "re", "same", "seem", "seemed", "seeming", "seems", "several", "she",
    "should", "since", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore",
    "therein", "thereupon", "these", "they", "this", "those", "though", "through",
    "throughout", "thru", "thus", "to", "together", "too", "toward", "towards", "under",
    "until", "up", "upon", "us", "very", "via", "was", "we", "well", "were", "what",
    "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby",
    "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves",
];

static STOP_WORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

#[must_use]
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORD_SET.contains(word)
}

/// Lowercased word tokens with stop words removed
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !is_stop_word(token))
        .map(str::to_string)
        .collect()
}

/// Text → term list pipeline shared by fitting and transforming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analyzer {
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub lowercase: bool,
    pub remove_stop_words: bool,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self {
            ngram_min: 1,
            ngram_max: 2,
            lowercase: true,
            remove_stop_words: true,
        }
    }
}

impl Analyzer {
    /// Produce unigram..=ngram_max terms in document order
    #[must_use]
    pub fn analyze(&self, text: &str) -> Vec<String> {
        let folded;
        let source = if self.lowercase {
            folded = text.to_lowercase();
            folded.as_str()
        } else {
            text
        };

        let words: Vec<&str> = TOKEN_PATTERN
            .find_iter(source)
            .map(|m| m.as_str())
            .filter(|token| !self.remove_stop_words || !is_stop_word(&token.to_lowercase()))
            .collect();

        let min = self.ngram_min.max(1);
        let max = self.ngram_max.max(min);
        let mut terms = Vec::with_capacity(words.len() * (max - min + 1));
        for n in min..=max {
            if n > words.len() {
                break;
            }
            if n == 1 {
                terms.extend(words.iter().map(|w| (*w).to_string()));
            } else {
                terms.extend(words.windows(n).map(|window| window.join(" ")));
            }
        }
        terms
    }
}
