//! Integration tests for the sweeper
//!
//! These tests drive the full coordinator against in-process autocomplete
//! services, and use wiremock to exercise the HTTP client and a small sweep
//! over a real socket.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vocab_sweep::config::{Config, CrawlerConfig, OutputConfig, RateLimitConfig, ServiceConfig};
use vocab_sweep::crawler::{
    AutocompleteService, Coordinator, HttpAutocompleteClient, ServiceResponse,
};
use vocab_sweep::output::read_artifact;
use vocab_sweep::storage::{CheckpointStore, JsonCheckpointStore, StorageError, StorageResult};
use vocab_sweep::{CrawlState, Prefix};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const VOCABULARY: &[&str] = &[
    "a", "aaa", "aab", "aac", "aaca", "ab", "abba", "abc", "acab", "acca", "b", "ba", "bab",
    "bac", "bacc", "bb", "bbc", "bca", "c", "ca", "cab", "cabb", "cac", "cc", "cca", "ccab",
    "ccc",
];

/// Creates a test configuration writing into `dir`
fn create_test_config(
    dir: &TempDir,
    alphabet: &str,
    max_results: usize,
    seed_depth: usize,
    max_depth: usize,
) -> Config {
    Config {
        service: ServiceConfig {
            base_url: "http://localhost/complete".to_string(),
            query_param: "query".to_string(),
            max_results,
            request_timeout: 2_000,
            user_agent: "TestSweep/1.0".to_string(),
        },
        crawler: CrawlerConfig {
            alphabet: alphabet.to_string(),
            seed_depth,
            max_depth,
            workers: 3,
            max_in_flight: 3,
            max_retries: 3,
            max_throttle_retries: 8,
            progress_interval: 5,
        },
        rate_limit: RateLimitConfig {
            min_delay: 10, // Very short for testing
            max_delay: 2_000,
            retry_delay: 50,
            cooldown: 1_000,
            jitter: 0.0,
            recovery_factor: 0.9,
        },
        output: OutputConfig {
            checkpoint_path: dir.path().join("checkpoint.json").display().to_string(),
            artifact_path: dir.path().join("entries.json").display().to_string(),
            checkpoint_interval: 3_600_000,
        },
    }
}

fn json_store(config: &Config) -> Arc<JsonCheckpointStore> {
    Arc::new(JsonCheckpointStore::new(&config.output.checkpoint_path))
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Answers with the first K vocabulary words starting with the query, sorted
struct DictionaryService {
    words: Vec<String>,
    max_results: usize,
    calls: Mutex<Vec<String>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl DictionaryService {
    fn new(words: &[&str], max_results: usize) -> Self {
        let mut words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        words.sort();
        Self {
            words,
            max_results,
            calls: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    /// Cancels `token` once `calls` queries have been answered
    fn interrupt_after(mut self, calls: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((calls, token));
        self
    }

    fn answer(&self, text: &str) -> Vec<String> {
        self.words
            .iter()
            .filter(|w| w.starts_with(text))
            .take(self.max_results)
            .cloned()
            .collect()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutocompleteService for DictionaryService {
    async fn query(&self, text: &str) -> ServiceResponse {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(text.to_string());
            calls.len()
        };
        if let Some((limit, token)) = &self.cancel_after {
            if count >= *limit {
                token.cancel();
            }
        }
        ServiceResponse::Results(self.answer(text))
    }
}

/// Fixed answers per prefix; anything else gets an empty result
struct ScenarioService {
    answers: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScenarioService {
    fn new(answers: &[(&str, &[&str])]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(prefix, entries)| {
                    (
                        prefix.to_string(),
                        entries.iter().map(|e| e.to_string()).collect(),
                    )
                })
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AutocompleteService for ScenarioService {
    async fn query(&self, text: &str) -> ServiceResponse {
        self.calls.lock().unwrap().push(text.to_string());
        ServiceResponse::Results(self.answers.get(text).cloned().unwrap_or_default())
    }
}

/// Rate-limits the first `throttles` attempts of every prefix
struct ThrottlingService {
    inner: DictionaryService,
    throttles: u32,
    attempts: Mutex<HashMap<String, u32>>,
}

#[async_trait]
impl AutocompleteService for ThrottlingService {
    async fn query(&self, text: &str) -> ServiceResponse {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let attempt = attempts.entry(text.to_string()).or_insert(0);
            *attempt += 1;
            *attempt
        };
        if attempt <= self.throttles {
            return ServiceResponse::RateLimited { retry_after: None };
        }
        self.inner.query(text).await
    }
}

/// Fails every query for the listed prefixes
struct BrokenPrefixService {
    inner: DictionaryService,
    broken: BTreeSet<String>,
}

#[async_trait]
impl AutocompleteService for BrokenPrefixService {
    async fn query(&self, text: &str) -> ServiceResponse {
        if self.broken.contains(text) {
            return ServiceResponse::HttpError { status_code: 500 };
        }
        self.inner.query(text).await
    }
}

/// JSON store that counts saves
struct CountingStore {
    inner: JsonCheckpointStore,
    saves: AtomicUsize,
}

impl CountingStore {
    fn new(config: &Config) -> Self {
        Self {
            inner: JsonCheckpointStore::new(&config.output.checkpoint_path),
            saves: AtomicUsize::new(0),
        }
    }

    fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CheckpointStore for CountingStore {
    fn load(&self) -> StorageResult<Option<CrawlState>> {
        self.inner.load()
    }

    fn save(&self, state: &CrawlState) -> StorageResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(state)
    }

    fn clear(&self) -> StorageResult<()> {
        self.inner.clear()
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_letter_scenario_queries_expected_prefixes() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "ab", 2, 2, 3);

    // Only "a" and "ab" return exactly K = 2 results
    let service = Arc::new(ScenarioService::new(&[
        ("a", &["a-one", "a-two"]),
        ("ab", &["ab-one", "ab-two"]),
        ("b", &["bee"]),
        ("aa", &["aa-x"]),
        ("bb", &["bee"]),
        ("aba", &["ab-one"]),
        ("abb", &["abb-x"]),
    ]));

    let mut coordinator =
        Coordinator::new(config, service.clone(), json_store_for(&dir), true).unwrap();
    let report = coordinator.run().await.unwrap();

    let mut calls = service.calls.lock().unwrap().clone();
    calls.sort();
    assert_eq!(calls, vec!["a", "aa", "ab", "aba", "abb", "b", "ba", "bb"]);

    assert!(!report.cancelled);
    assert_eq!(report.queries_completed, 8);
    assert_eq!(
        coordinator.cache().snapshot_entries(),
        set(&["a-one", "a-two", "aa-x", "ab-one", "ab-two", "abb-x", "bee"])
    );
    assert_eq!(report.entries, 7);
}

fn json_store_for(dir: &TempDir) -> Arc<JsonCheckpointStore> {
    Arc::new(JsonCheckpointStore::new(dir.path().join("checkpoint.json")))
}

#[tokio::test(start_paused = true)]
async fn test_sweep_recovers_whole_vocabulary() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "abc", 3, 1, 4);
    let artifact_path = config.output.artifact_path.clone();
    let store = json_store(&config);

    let service = Arc::new(DictionaryService::new(VOCABULARY, 3));
    let mut coordinator = Coordinator::new(config, service.clone(), store, true).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(coordinator.cache().snapshot_entries(), set(VOCABULARY));
    assert_eq!(report.entries, VOCABULARY.len());
    assert!(report.failed.is_empty());

    // Every prefix is queried at most once
    let calls = service.calls();
    let distinct: BTreeSet<&String> = calls.iter().collect();
    assert_eq!(distinct.len(), calls.len());

    // A child is only ever queried when its parent's answer was truncated
    for call in &calls {
        let prefix = Prefix::new(call.as_str());
        if prefix.depth() <= 1 {
            continue;
        }
        let parent: String = call.chars().take(prefix.depth() - 1).collect();
        let parent_result = coordinator.cache().get(&Prefix::new(parent)).unwrap();
        assert!(parent_result.truncated, "{} queried under a complete parent", call);
    }

    let artifact = read_artifact(Path::new(&artifact_path)).unwrap();
    let expected: Vec<String> = set(VOCABULARY).into_iter().collect();
    assert_eq!(artifact, expected);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_entries_do_not_inflate_count() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "xy", 5, 1, 1);

    let service = Arc::new(ScenarioService::new(&[
        ("x", &["shared", "x-only"]),
        ("y", &["shared", "y-only", "x-only"]),
    ]));

    let mut coordinator = Coordinator::new(config, service, json_store_for(&dir), true).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.entries, 3);
    assert_eq!(
        coordinator.cache().snapshot_entries(),
        set(&["shared", "x-only", "y-only"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_twice_then_resolved() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "abc", 3, 1, 4);
    let min_delay = config.rate_limit.min_delay();

    let service = Arc::new(ThrottlingService {
        inner: DictionaryService::new(VOCABULARY, 3),
        throttles: 2,
        attempts: Mutex::new(HashMap::new()),
    });

    let mut coordinator =
        Coordinator::new(config, service.clone(), json_store_for(&dir), true).unwrap();
    let report = coordinator.run().await.unwrap();

    assert!(report.failed.is_empty());
    assert_eq!(report.counters.failed_queries, 0);
    assert_eq!(coordinator.cache().snapshot_entries(), set(VOCABULARY));

    let queries = report.queries_completed;
    assert_eq!(report.counters.rate_limit_hits, 2 * queries);
    assert_eq!(report.counters.requests_issued, 3 * queries);
    assert!(coordinator.governor().current_target() > min_delay);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_writes_one_consistent_final_checkpoint() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "abc", 3, 1, 4);
    let artifact_path = config.output.artifact_path.clone();
    let store = Arc::new(CountingStore::new(&config));

    let cancel = CancellationToken::new();
    let service =
        Arc::new(DictionaryService::new(VOCABULARY, 3).interrupt_after(5, cancel.clone()));

    let mut coordinator = Coordinator::new(config, service.clone(), store.clone(), true)
        .unwrap()
        .with_cancellation(cancel);
    let report = coordinator.run().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(store.saves(), 1);
    assert!(report.pending > 0);

    let saved = store.load().unwrap().unwrap();
    let artifact: BTreeSet<String> = read_artifact(Path::new(&artifact_path))
        .unwrap()
        .into_iter()
        .collect();

    assert_eq!(saved.entries, artifact);
    assert_eq!(saved.entries, coordinator.cache().snapshot_entries());
    assert_eq!(saved.cache.len(), service.calls().len());
    assert_eq!(saved.pending.len(), report.pending);
}

/// Answers every prefix with one entry after a fixed delay
struct SlowService {
    delay: Duration,
}

#[async_trait]
impl AutocompleteService for SlowService {
    async fn query(&self, text: &str) -> ServiceResponse {
        tokio::time::sleep(self.delay).await;
        ServiceResponse::Results(vec![format!("{}-word", text)])
    }
}

/// JSON store whose first `failures` saves return an error
struct UnreliableStore {
    inner: JsonCheckpointStore,
    failures: usize,
    attempts: AtomicUsize,
}

impl UnreliableStore {
    fn new(config: &Config, failures: usize) -> Self {
        Self {
            inner: JsonCheckpointStore::new(&config.output.checkpoint_path),
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl CheckpointStore for UnreliableStore {
    fn load(&self) -> StorageResult<Option<CrawlState>> {
        self.inner.load()
    }

    fn save(&self, state: &CrawlState) -> StorageResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(StorageError::Io {
                path: self.inner.path().display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.save(state)
    }

    fn clear(&self) -> StorageResult<()> {
        self.inner.clear()
    }
}

#[tokio::test(start_paused = true)]
async fn test_periodic_checkpoints_survive_failed_save() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, "abcdefghij", 3, 1, 1);
    config.crawler.workers = 1;
    config.crawler.max_in_flight = 1;
    config.output.checkpoint_interval = 2_000;

    // Ten queries of one second each span several checkpoint intervals
    let store = Arc::new(UnreliableStore::new(&config, 1));
    let service = Arc::new(SlowService {
        delay: Duration::from_secs(1),
    });

    let mut coordinator = Coordinator::new(config, service, store.clone(), true).unwrap();
    let started = tokio::time::Instant::now();
    let report = coordinator.run().await.unwrap();

    assert!(!report.cancelled);
    assert!(started.elapsed() >= Duration::from_secs(10));

    // The first periodic save failed, later ones and the final save went through
    assert!(store.attempts() >= 4, "only {} saves", store.attempts());

    let saved = store.load().unwrap().unwrap();
    let expected: BTreeSet<String> = "abcdefghij"
        .chars()
        .map(|c| format!("{}-word", c))
        .collect();
    assert_eq!(saved.entries, expected);
    assert_eq!(report.entries, 10);
    assert!(saved.pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resume_matches_uninterrupted_run() {
    // Reference run
    let reference_dir = TempDir::new().unwrap();
    let config = create_test_config(&reference_dir, "abc", 3, 1, 4);
    let store = json_store(&config);
    let mut coordinator = Coordinator::new(
        config,
        Arc::new(DictionaryService::new(VOCABULARY, 3)),
        store,
        true,
    )
    .unwrap();
    let reference = coordinator.run().await.unwrap();
    let expected = coordinator.cache().snapshot_entries();

    for interrupt_at in [1, 4, 9] {
        let dir = TempDir::new().unwrap();
        let config = create_test_config(&dir, "abc", 3, 1, 4);

        let cancel = CancellationToken::new();
        let first = Arc::new(
            DictionaryService::new(VOCABULARY, 3).interrupt_after(interrupt_at, cancel.clone()),
        );
        let mut coordinator = Coordinator::new(config.clone(), first, json_store(&config), true)
            .unwrap()
            .with_cancellation(cancel);
        let interrupted = coordinator.run().await.unwrap();
        assert!(interrupted.cancelled);

        let checkpoint = json_store(&config).load().unwrap().unwrap();

        let second = Arc::new(DictionaryService::new(VOCABULARY, 3));
        let mut coordinator =
            Coordinator::new(config.clone(), second.clone(), json_store(&config), false).unwrap();
        let resumed = coordinator.run().await.unwrap();

        assert!(!resumed.cancelled);
        assert_eq!(coordinator.cache().snapshot_entries(), expected);
        assert_eq!(resumed.entries, reference.entries);

        // Prefixes answered before the interrupt are not queried again
        for call in second.calls() {
            assert!(!checkpoint.cache.contains_key(&Prefix::new(call.as_str())));
        }

        // Counters continue across the two runs
        assert_eq!(
            resumed.counters.requests_issued,
            reference.counters.requests_issued
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_fresh_discards_previous_checkpoint() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "abc", 3, 1, 4);

    let cancel = CancellationToken::new();
    let first = Arc::new(DictionaryService::new(VOCABULARY, 3).interrupt_after(3, cancel.clone()));
    let mut coordinator = Coordinator::new(config.clone(), first, json_store(&config), true)
        .unwrap()
        .with_cancellation(cancel);
    coordinator.run().await.unwrap();
    assert!(json_store(&config).load().unwrap().is_some());

    let second = Arc::new(DictionaryService::new(VOCABULARY, 3));
    let coordinator =
        Coordinator::new(config.clone(), second, json_store(&config), true).unwrap();

    assert!(json_store(&config).load().unwrap().is_none());
    assert!(coordinator.cache().is_empty());
    assert_eq!(coordinator.counters().requests_issued(), 0);
    assert_eq!(coordinator.frontier_size(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_prefix_is_retried_on_resume() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "abc", 3, 1, 4);

    let broken = Arc::new(BrokenPrefixService {
        inner: DictionaryService::new(VOCABULARY, 3),
        broken: set(&["b"]),
    });
    let mut coordinator =
        Coordinator::new(config.clone(), broken, json_store(&config), true).unwrap();
    let first = coordinator.run().await.unwrap();

    assert_eq!(first.failed, vec![Prefix::new("b")]);
    assert_eq!(first.counters.failed_queries, 1);
    assert!(!coordinator.cache().contains(&Prefix::new("b")));

    let saved = json_store(&config).load().unwrap().unwrap();
    assert!(saved.failed.contains(&Prefix::new("b")));

    let healthy = Arc::new(DictionaryService::new(VOCABULARY, 3));
    let mut coordinator =
        Coordinator::new(config.clone(), healthy, json_store(&config), false).unwrap();
    let second = coordinator.run().await.unwrap();

    assert!(second.failed.is_empty());
    assert_eq!(coordinator.cache().snapshot_entries(), set(VOCABULARY));
    assert!(json_store(&config).load().unwrap().unwrap().failed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_truncation_at_depth_ceiling_is_counted() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "abc", 3, 1, 2);

    // With max depth 2, "aaca" and "ccc" stay hidden behind truncated answers
    let service = Arc::new(DictionaryService::new(VOCABULARY, 3));
    let mut coordinator = Coordinator::new(config, service, json_store_for(&dir), true).unwrap();
    let report = coordinator.run().await.unwrap();

    assert!(report.counters.depth_limited > 0);
    assert!(report.entries < VOCABULARY.len());
}

/// Answers autocomplete requests from the vocabulary over HTTP
struct VocabularyResponder {
    service: DictionaryService,
}

impl Respond for VocabularyResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let text = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "query")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "version": "test",
            "results": self.service.answer(&text),
        }))
    }
}

fn service_config(server: &MockServer) -> ServiceConfig {
    ServiceConfig {
        base_url: format!("{}/complete", server.uri()),
        query_param: "query".to_string(),
        max_results: 3,
        request_timeout: 2_000,
        user_agent: "TestSweep/1.0".to_string(),
    }
}

#[tokio::test]
async fn test_http_client_classifies_responses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/complete"))
        .and(query_param("query", "a b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"results": ["a bee", "a bow"], "count": 2})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/complete"))
        .and(query_param("query", "slow"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/complete"))
        .and(query_param("query", "boom"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/complete"))
        .and(query_param("query", "junk"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let client = HttpAutocompleteClient::new(&service_config(&mock_server)).unwrap();

    assert_eq!(
        client.query("a b").await,
        ServiceResponse::Results(vec!["a bee".to_string(), "a bow".to_string()])
    );
    assert_eq!(
        client.query("slow").await,
        ServiceResponse::RateLimited {
            retry_after: Some(Duration::from_secs(2))
        }
    );
    assert_eq!(
        client.query("boom").await,
        ServiceResponse::HttpError { status_code: 500 }
    );
    assert!(matches!(
        client.query("junk").await,
        ServiceResponse::NetworkError { .. }
    ));
}

#[tokio::test]
async fn test_sweep_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/complete"))
        .respond_with(VocabularyResponder {
            service: DictionaryService::new(VOCABULARY, 3),
        })
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, "abc", 3, 1, 4);
    config.service = service_config(&mock_server);
    config.rate_limit.min_delay = 1;
    config.rate_limit.retry_delay = 1;
    config.rate_limit.max_delay = 50;

    let client = Arc::new(HttpAutocompleteClient::new(&config.service).unwrap());
    let store = json_store(&config);
    let mut coordinator = Coordinator::new(config, client, store.clone(), true).unwrap();
    let report = coordinator.run().await.unwrap();

    assert!(!report.cancelled);
    assert_eq!(coordinator.cache().snapshot_entries(), set(VOCABULARY));

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len() as u64, report.counters.requests_issued);

    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.entries, set(VOCABULARY));
    assert!(saved.pending.is_empty());
}
