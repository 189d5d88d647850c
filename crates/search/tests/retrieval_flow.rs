use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use context_corpus::{ChunkSource, LoadReport};
use context_search::{
    Chunk, ChunkType, Corpus, CorpusOptions, FileTypeCategory, Intent, JsonRecordSource,
    QueryClassifier, RetrievalConfig, RetrievalEngine,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_record(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).expect("write record");
}

fn engine_over(chunks: Vec<Chunk>) -> RetrievalEngine {
    let corpus = Corpus::from_chunks(chunks, CorpusOptions::default());
    RetrievalEngine::new(Arc::new(corpus), RetrievalConfig::default())
}

fn project_chunks() -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for i in 0..12 {
        chunks.push(Chunk::new(
            format!("src/installer/step{i}.py"),
            1,
            20,
            format!("def run_step_{i}():\n    # install script step {i}\n    return install(\"pkg{i}\")"),
            ChunkType::Function,
        ));
    }
    for i in 0..4 {
        chunks.push(Chunk::new(
            format!("config/install{i}.toml"),
            1,
            8,
            format!("[install]\nscript = \"bin/install{i}.sh\"\nretries = {i}"),
            ChunkType::Config,
        ));
    }
    for i in 0..4 {
        chunks.push(Chunk::new(
            format!("docs/install{i}.md"),
            1,
            30,
            format!("Install guide part {i}: run the install script and verify the result."),
            ChunkType::Documentation,
        ));
    }
    chunks
}

#[test]
fn install_windows_script_outranks_readme() {
    init_logging();
    let temp = TempDir::new().expect("tempdir");
    write_record(
        temp.path(),
        "setup_windows.json",
        r#"{"source_path": "setup_windows.bat", "chunks": [
            {"text": "@echo off\nREM prepare the machine\npip install -r requirements.txt", "type": "script", "start_line": 1, "end_line": 3, "confidence": 0.9}
        ]}"#,
    );
    write_record(
        temp.path(),
        "readme.json",
        r#"{"source_path": "docs/readme.md", "chunks": [
            {"text": "To enhance the install script on windows, edit the install script and rerun the install script.", "type": "documentation", "start_line": 1, "end_line": 4, "confidence": 1.0}
        ]}"#,
    );

    let engine = RetrievalEngine::from_source(
        JsonRecordSource::new(temp.path()),
        RetrievalConfig::default(),
    );

    for result in [
        engine.search("enhance install script windows", 5, None),
        engine.search_multi_query("enhance install script windows", 5, None),
    ] {
        assert_eq!(result.intent, Intent::Technical);
        let paths: Vec<&str> = result.chunks.iter().map(|c| c.source_path.as_str()).collect();
        assert_eq!(paths, vec!["setup_windows.bat", "docs/readme.md"]);
        assert!(result.chunks[0].relevance_score > result.chunks[1].relevance_score);
    }
}

#[test]
fn results_are_bounded_and_scored_in_unit_interval() {
    let engine = engine_over(project_chunks());
    for (query, max) in [
        ("install script", 5),
        ("install guide documentation", 3),
        ("retries config", 10),
        ("run step", 1),
    ] {
        let result = engine.search_multi_query(query, max, None);
        assert!(result.chunks.len() <= max, "{query}");
        assert!(result.chunks.len() <= result.total_candidates);
        for chunk in &result.chunks {
            assert!((0.0..=1.0).contains(&chunk.relevance_score), "{query}");
        }
        assert!(result
            .chunks
            .windows(2)
            .all(|w| w[0].relevance_score >= w[1].relevance_score));
    }
}

#[test]
fn repeated_queries_are_identical() {
    let engine = engine_over(project_chunks());
    let first = engine.search_multi_query("install script step", 8, None);
    let second = engine.search_multi_query("install script step", 8, None);
    assert_eq!(first.chunks, second.chunks);
    assert_eq!(first.variants, second.variants);
}

#[test]
fn technical_results_leave_room_for_other_categories() {
    let engine = engine_over(project_chunks());
    let result = engine.search("install script", 10, None);
    assert_eq!(result.intent, Intent::Technical);
    assert_eq!(result.chunks.len(), 10);
    let code = result
        .chunks
        .iter()
        .filter(|c| c.file_type_category == FileTypeCategory::Code)
        .count();
    assert!(code <= 6, "selected {code} code chunks");
}

#[test]
fn multi_query_finds_at_least_as_many_candidates() {
    let engine = engine_over(project_chunks());
    let single = engine.search("enhance install script", 20, None);
    let multi = engine.search_multi_query("enhance install script", 20, None);
    assert!(multi.variants.len() > 1);
    assert_eq!(multi.variants[0], "enhance install script");
    assert!(multi.total_candidates >= single.total_candidates);
}

#[test]
fn extension_filter_limits_results() {
    let engine = engine_over(project_chunks());
    let filter = vec![".toml".to_string()];
    let result = engine.search("install script", 10, Some(&filter));
    assert!(!result.chunks.is_empty());
    assert!(result
        .chunks
        .iter()
        .all(|c| c.source_path.ends_with(".toml")));
}

#[test]
fn empty_and_missing_stores_return_no_chunks() {
    init_logging();
    let temp = TempDir::new().expect("tempdir");
    let empty = RetrievalEngine::from_source(
        JsonRecordSource::new(temp.path()),
        RetrievalConfig::default(),
    );
    let result = empty.search_multi_query("install script", 5, None);
    assert!(result.chunks.is_empty());
    assert_eq!(result.total_candidates, 0);

    let missing = RetrievalEngine::from_source(
        JsonRecordSource::new(temp.path().join("nope")),
        RetrievalConfig::default(),
    );
    let result = missing.search("install script", 5, None);
    assert!(result.chunks.is_empty());
    assert!(!result.warnings.is_empty());
}

#[test]
fn search_result_serializes_for_callers() {
    let result = engine_over(project_chunks()).search("install script", 2, None);
    let json = serde_json::to_value(&result).expect("serialize result");
    assert_eq!(json["intent"], "technical");
    assert_eq!(json["query"], "install script");
    assert_eq!(json["chunks"].as_array().map(Vec::len), Some(2));
    assert!(json["chunks"][0]["relevance_score"].as_f64().is_some());
}

#[test]
fn unrelated_query_is_general() {
    assert_eq!(QueryClassifier::classify("purple elephants"), Intent::General);
    let result = engine_over(project_chunks()).search("purple elephants", 5, None);
    assert_eq!(result.intent, Intent::General);
    assert!(result.chunks.is_empty());
}

struct SlowSource {
    delay: Duration,
    chunks: Vec<Chunk>,
}

impl ChunkSource for SlowSource {
    fn load(&self) -> context_corpus::Result<LoadReport> {
        std::thread::sleep(self.delay);
        Ok(LoadReport {
            chunks: self.chunks.clone(),
            ..LoadReport::default()
        })
    }

    fn describe(&self) -> String {
        "slow test source".to_string()
    }
}

#[tokio::test]
async fn timeout_returns_flagged_empty_result() {
    let engine = RetrievalEngine::from_source(
        SlowSource {
            delay: Duration::from_millis(500),
            chunks: project_chunks(),
        },
        RetrievalConfig::default(),
    );
    let result = engine
        .search_with_timeout("install script", 5, None, Duration::from_millis(20))
        .await;
    assert!(result.timed_out);
    assert!(result.chunks.is_empty());
    assert_eq!(result.intent, Intent::Technical);
}

#[tokio::test]
async fn generous_timeout_matches_blocking_search() {
    let engine = engine_over(project_chunks());
    let expected = engine.search_multi_query("install guide", 5, None);
    let result = engine
        .search_with_timeout(
            "install guide",
            5,
            Some(vec!["docs".to_string(), "toml".to_string()]),
            Duration::from_secs(30),
        )
        .await;
    assert!(!result.timed_out);
    assert!(result.chunks.len() <= 5);
    assert!(result.chunks.iter().all(|c| {
        c.file_type_category == FileTypeCategory::Documentation || c.source_path.ends_with(".toml")
    }));

    let unfiltered = engine
        .search_with_timeout("install guide", 5, None, Duration::from_secs(30))
        .await;
    assert_eq!(unfiltered.chunks, expected.chunks);
}
