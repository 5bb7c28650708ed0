// 📡 Data Loader - Fetch raw person/filter collections
//
// One outstanding request per collection, bounded by a timeout.
// A failed fetch schedules exactly one delayed retry, never more.

use crate::error::LoadError;
use crate::filter::RawFilter;
use crate::person::Person;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Fixed delay before the single retry
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// COLLECTIONS + SOURCES
// ============================================================================

/// The two independently fetched collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Persons,
    Filters,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Persons => "persons",
            Collection::Filters => "filters",
        }
    }

    /// File name under the data directory (or `/data/` on a server)
    pub fn file_name(&self) -> &'static str {
        match self {
            Collection::Persons => "persons.json",
            Collection::Filters => "filters.json",
        }
    }
}

/// Where raw payloads come from
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch the raw JSON body of `collection`
    async fn fetch(&self, collection: Collection) -> Result<String, LoadError>;
}

/// Fetches `{base_url}/data/{collection}.json` over HTTP
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, collection: Collection) -> String {
        format!("{}/data/{}", self.base_url, collection.file_name())
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn fetch(&self, collection: Collection) -> Result<String, LoadError> {
        let url = self.url_for(collection);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }

        Ok(response.text().await?)
    }
}

/// Reads `{dir}/{collection}.json` from disk
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        FileSource { dir: dir.into() }
    }
}

#[async_trait]
impl RecordSource for FileSource {
    async fn fetch(&self, collection: Collection) -> Result<String, LoadError> {
        let path = self.dir.join(collection.file_name());
        debug!("Reading {:?}", path);
        Ok(tokio::fs::read_to_string(path).await?)
    }
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    async fn fetch(&self, collection: Collection) -> Result<String, LoadError> {
        (**self).fetch(collection).await
    }
}

// ============================================================================
// PAYLOAD PARSING
// ============================================================================

/// Parse a payload into records.
///
/// Invalid JSON is an error. Valid JSON that is not an array means
/// "nothing to load" and yields an empty list.
pub fn parse_records<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, LoadError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Array(items) => Ok(serde_json::from_value(Value::Array(items))?),
        other => {
            debug!("Payload is not an array ({}), nothing to load", json_kind(&other));
            Ok(Vec::new())
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// DATA LOADER
// ============================================================================

pub struct DataLoader<S> {
    source: S,
    retry_delay: Duration,
    timeout: Duration,
}

impl<S: RecordSource> DataLoader<S> {
    pub fn new(source: S) -> Self {
        DataLoader {
            source,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch person records; with `retry`, one delayed retry on failure
    pub async fn fetch_persons(&self, retry: bool) -> Result<Vec<Person>, LoadError> {
        self.fetch_records(Collection::Persons, retry).await
    }

    /// Fetch filter definitions; with `retry`, one delayed retry on failure
    pub async fn fetch_filters(&self, retry: bool) -> Result<Vec<RawFilter>, LoadError> {
        self.fetch_records(Collection::Filters, retry).await
    }

    async fn fetch_records<T: DeserializeOwned>(
        &self,
        collection: Collection,
        retry: bool,
    ) -> Result<Vec<T>, LoadError> {
        let err = match self.attempt(collection).await {
            Ok(records) => return Ok(records),
            Err(e) => e,
        };

        if !retry {
            error!("ERROR getting {}: {}", collection.name(), err);
            return Err(err);
        }

        warn!(
            "ERROR getting {}: {} (retrying once in {}s)",
            collection.name(),
            err,
            self.retry_delay.as_secs()
        );
        tokio::time::sleep(self.retry_delay).await;

        // The retried attempt never schedules another retry
        self.attempt(collection).await.map_err(|e| {
            error!("ERROR getting {} after retry: {}", collection.name(), e);
            e
        })
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, LoadError> {
        let body = tokio::time::timeout(self.timeout, self.source.fetch(collection))
            .await
            .map_err(|_| LoadError::Timeout(self.timeout.as_secs()))??;

        parse_records(&body)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays canned responses, counting calls
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<String, LoadError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<String, LoadError>>) -> Self {
            ScriptedSource {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn fetch(&self, _collection: Collection) -> Result<String, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LoadError::Status(503)))
        }
    }

    /// Never answers
    struct HangingSource;

    #[async_trait]
    impl RecordSource for HangingSource {
        async fn fetch(&self, _collection: Collection) -> Result<String, LoadError> {
            std::future::pending().await
        }
    }

    const PERSONS: &str = r#"[
        {"firstName": "Bob", "lastName": "Zephyr"},
        {"firstName": "Amy", "lastName": "Adams"}
    ]"#;

    #[tokio::test]
    async fn test_fetch_success_first_try() {
        let loader = DataLoader::new(ScriptedSource::new(vec![Ok(PERSONS.to_string())]));

        let persons = loader.fetch_persons(true).await.unwrap();

        assert_eq!(persons.len(), 2);
        assert_eq!(persons[0].last_name.as_deref(), Some("Zephyr"));
        assert_eq!(loader.source().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_retry_after_fixed_delay() {
        let loader = DataLoader::new(ScriptedSource::new(vec![
            Err(LoadError::Status(500)),
            Ok(PERSONS.to_string()),
        ]));
        let start = Instant::now();

        let persons = loader.fetch_persons(true).await.unwrap();

        assert_eq!(persons.len(), 2);
        assert_eq!(loader.source().calls(), 2);
        assert!(start.elapsed() >= DEFAULT_RETRY_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_is_bounded_to_one() {
        let loader = DataLoader::new(ScriptedSource::new(vec![
            Err(LoadError::Status(500)),
            Err(LoadError::Status(500)),
            Ok(PERSONS.to_string()),
        ]));

        let result = loader.fetch_persons(true).await;

        assert!(matches!(result, Err(LoadError::Status(500))));
        assert_eq!(loader.source().calls(), 2);
    }

    #[tokio::test]
    async fn test_no_retry_when_disabled() {
        let loader = DataLoader::new(ScriptedSource::new(vec![
            Err(LoadError::Status(404)),
            Ok(PERSONS.to_string()),
        ]));

        let result = loader.fetch_filters(false).await;

        assert!(matches!(result, Err(LoadError::Status(404))));
        assert_eq!(loader.source().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let loader = DataLoader::new(HangingSource)
            .with_timeout(Duration::from_secs(2))
            .with_retry_delay(Duration::from_secs(1));

        let result = loader.fetch_persons(true).await;

        assert!(matches!(result, Err(LoadError::Timeout(2))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_json_is_retried() {
        let loader = DataLoader::new(ScriptedSource::new(vec![
            Ok("{not json".to_string()),
            Ok("[]".to_string()),
        ]));

        let filters = loader.fetch_filters(true).await.unwrap();

        assert!(filters.is_empty());
        assert_eq!(loader.source().calls(), 2);
    }

    #[test]
    fn test_non_array_payload_is_nothing_to_load() {
        let persons: Vec<Person> = parse_records(r#"{"persons": []}"#).unwrap();
        assert!(persons.is_empty());

        let persons: Vec<Person> = parse_records("null").unwrap();
        assert!(persons.is_empty());
    }

    #[test]
    fn test_parse_filters() {
        let filters: Vec<RawFilter> =
            parse_records(r#"[{"description": "IL", "criteria": {"state": "IL"}}]"#).unwrap();

        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].criteria.get("state").map(String::as_str), Some("IL"));
    }

    #[tokio::test]
    async fn test_file_source_reads_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("persons.json"), PERSONS).unwrap();
        let loader = DataLoader::new(FileSource::new(dir.path()));

        let persons = loader.fetch_persons(false).await.unwrap();

        assert_eq!(persons.len(), 2);
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DataLoader::new(FileSource::new(dir.path()));

        let result = loader.fetch_filters(false).await;

        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn test_http_source_url() {
        let source = HttpSource::new("http://localhost:3000/", DEFAULT_TIMEOUT).unwrap();

        assert_eq!(
            source.url_for(Collection::Filters),
            "http://localhost:3000/data/filters.json"
        );
    }
}
