//! HTTP clients for the remote table and the cloud file store.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tokio::runtime::Handle;
use tracing::debug;

use oink_core::BackendError;
use oink_core::backend::{FileStore, RemoteTable};
use oink_core::codec::{HEADER, RemoteRecord};

/// Where the bearer token comes from.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    token: Option<String>,
    token_file: Option<PathBuf>,
}

impl Credentials {
    pub fn new(token: Option<String>, token_file: Option<PathBuf>) -> Self {
        Self { token, token_file }
    }

    /// The token file wins when set; it is read fresh on every call.
    fn current(&self) -> Result<Option<String>, BackendError> {
        if let Some(path) = &self.token_file {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                BackendError::AuthExpired(format!(
                    "cannot read token file {}: {e}",
                    path.display()
                ))
            })?;
            let token = raw.trim();
            if !token.is_empty() {
                return Ok(Some(token.to_string()));
            }
        }
        Ok(self.token.clone())
    }
}

fn build_client(rt: &Handle) -> Result<reqwest::Client, BackendError> {
    let _guard = rt.enter();
    reqwest::Client::builder()
        .user_agent(format!("oink/{} (food log)", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| BackendError::Unavailable(format!("failed to build HTTP client: {e}")))
}

fn transport_error(e: &reqwest::Error) -> BackendError {
    if e.is_connect() || e.is_timeout() {
        BackendError::Unavailable(e.to_string())
    } else {
        BackendError::TransientIo(e.to_string())
    }
}

fn check_status(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let msg = format!("{} returned {status}", resp.url());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::AuthExpired(msg),
        StatusCode::SERVICE_UNAVAILABLE => BackendError::Unavailable(msg),
        _ => BackendError::TransientIo(msg),
    })
}

/// Shared connection state: client, base URL, current token.
struct Connection {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
    rt: Handle,
}

impl Connection {
    fn open(base: &str, creds: &Credentials, rt: Handle) -> Result<Self, BackendError> {
        Ok(Self {
            client: build_client(&rt)?,
            base: base.trim_end_matches('/').to_string(),
            token: creds.current()?,
            rt,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.client.request(method, format!("{}/{path}", self.base));
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(req: RequestBuilder) -> Result<Response, BackendError> {
        req.send().await.map_err(|e| transport_error(&e))
    }
}

/// A remote table served as `{base}/records`.
pub struct HttpRemoteTable {
    conn: Connection,
    creds: Credentials,
}

impl HttpRemoteTable {
    pub fn new(base_url: &str, creds: Credentials, rt: Handle) -> Result<Self, BackendError> {
        let conn = Connection::open(base_url, &creds, rt)?;
        Ok(Self { conn, creds })
    }

    async fn fetch_all_async(&self) -> Result<Vec<RemoteRecord>, BackendError> {
        let resp = Connection::send(self.conn.request(Method::GET, "records")).await?;
        let resp = check_status(resp)?;
        resp.json::<Vec<RemoteRecord>>()
            .await
            .map_err(|e| BackendError::TransientIo(format!("malformed records response: {e}")))
    }

    async fn append_async(&self, row: &[String]) -> Result<(), BackendError> {
        let record: RemoteRecord = HEADER
            .iter()
            .zip(row)
            .map(|(key, value)| ((*key).to_string(), value.clone().into()))
            .collect();
        let req = self.conn.request(Method::POST, "records").json(&record);
        check_status(Connection::send(req).await?)?;
        Ok(())
    }

    async fn overwrite_all_async(&self, rows: &[Vec<String>]) -> Result<(), BackendError> {
        let req = self.conn.request(Method::PUT, "records").json(rows);
        check_status(Connection::send(req).await?)?;
        Ok(())
    }
}

impl RemoteTable for HttpRemoteTable {
    fn fetch_all_records(&self) -> Result<Vec<RemoteRecord>, BackendError> {
        self.conn.rt.block_on(self.fetch_all_async())
    }

    fn append_record(&self, row: &[String]) -> Result<(), BackendError> {
        self.conn.rt.block_on(self.append_async(row))
    }

    fn overwrite_all(&self, rows: &[Vec<String>]) -> Result<(), BackendError> {
        self.conn.rt.block_on(self.overwrite_all_async(rows))
    }

    fn reinitialize(&mut self) -> Result<(), BackendError> {
        debug!(base = %self.conn.base, "reconnecting to remote table");
        self.conn = Connection::open(&self.conn.base, &self.creds, self.conn.rt.clone())?;
        Ok(())
    }
}

/// A cloud file store served as `{base}/files/{name}`.
pub struct HttpFileStore {
    conn: Connection,
}

impl HttpFileStore {
    pub fn new(base_url: &str, creds: &Credentials, rt: Handle) -> Result<Self, BackendError> {
        Ok(Self {
            conn: Connection::open(base_url, creds, rt)?,
        })
    }

    async fn upload_async(&self, name: &str, contents: &[u8]) -> Result<(), BackendError> {
        let req = self
            .conn
            .request(Method::PUT, &format!("files/{name}"))
            .body(contents.to_vec());
        check_status(Connection::send(req).await?)?;
        Ok(())
    }

    async fn download_async(&self, name: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let req = self.conn.request(Method::GET, &format!("files/{name}"));
        let resp = Connection::send(req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = check_status(resp)?
            .bytes()
            .await
            .map_err(|e| transport_error(&e))?;
        Ok(Some(bytes.to_vec()))
    }
}

impl FileStore for HttpFileStore {
    fn upload(&self, name: &str, contents: &[u8]) -> Result<(), BackendError> {
        self.conn.rt.block_on(self.upload_async(name, contents))
    }

    fn download(&self, name: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.conn.rt.block_on(self.download_async(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, header};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::Value;
    use tokio::runtime::Runtime;

    use oink_core::backend::{Backend, RemoteTableBackend};
    use oink_core::{CaloriesPolicy, LogEntry};

    #[derive(Clone, Default)]
    struct TestState {
        token: Arc<Mutex<String>>,
        records: Arc<Mutex<Vec<Value>>>,
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        fail_with: Arc<Mutex<Option<StatusCode>>>,
    }

    fn check(state: &TestState, headers: &HeaderMap) -> Result<(), StatusCode> {
        if let Some(status) = *state.fail_with.lock().unwrap() {
            return Err(status);
        }
        let expected = format!("Bearer {}", state.token.lock().unwrap());
        match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            Some(v) if v == expected => Ok(()),
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }

    async fn list_records(
        State(state): State<TestState>,
        headers: HeaderMap,
    ) -> Result<Json<Vec<Value>>, StatusCode> {
        check(&state, &headers)?;
        Ok(Json(state.records.lock().unwrap().clone()))
    }

    async fn add_record(
        State(state): State<TestState>,
        headers: HeaderMap,
        Json(record): Json<Value>,
    ) -> StatusCode {
        if let Err(status) = check(&state, &headers) {
            return status;
        }
        state.records.lock().unwrap().push(record);
        StatusCode::CREATED
    }

    async fn replace_records(
        State(state): State<TestState>,
        headers: HeaderMap,
        Json(rows): Json<Vec<Vec<String>>>,
    ) -> StatusCode {
        if let Err(status) = check(&state, &headers) {
            return status;
        }
        let Some((header, rows)) = rows.split_first() else {
            return StatusCode::BAD_REQUEST;
        };
        let records = rows
            .iter()
            .map(|row| {
                let obj: serde_json::Map<String, Value> = header
                    .iter()
                    .zip(row)
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                Value::Object(obj)
            })
            .collect();
        *state.records.lock().unwrap() = records;
        StatusCode::NO_CONTENT
    }

    async fn put_file(
        State(state): State<TestState>,
        Path(name): Path<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        if let Err(status) = check(&state, &headers) {
            return status;
        }
        state.files.lock().unwrap().insert(name, body.to_vec());
        StatusCode::NO_CONTENT
    }

    async fn get_file(
        State(state): State<TestState>,
        Path(name): Path<String>,
        headers: HeaderMap,
    ) -> Result<Vec<u8>, StatusCode> {
        check(&state, &headers)?;
        state
            .files
            .lock()
            .unwrap()
            .get(&name)
            .cloned()
            .ok_or(StatusCode::NOT_FOUND)
    }

    fn spawn_server(rt: &Runtime, state: TestState) -> String {
        let app = Router::new()
            .route(
                "/records",
                get(list_records).post(add_record).put(replace_records),
            )
            .route("/files/{name}", get(get_file).put(put_file))
            .with_state(state);
        let listener = rt
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        rt.spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn state_with_token(token: &str) -> TestState {
        let state = TestState::default();
        *state.token.lock().unwrap() = token.to_string();
        state
    }

    fn creds(token: &str) -> Credentials {
        Credentials::new(Some(token.to_string()), None)
    }

    #[test]
    fn test_remote_table_append_and_fetch() {
        let rt = Runtime::new().unwrap();
        let state = state_with_token("t0k3n");
        let base = spawn_server(&rt, state.clone());

        let table = HttpRemoteTable::new(&base, creds("t0k3n"), rt.handle().clone()).unwrap();
        let mut backend = RemoteTableBackend::new(table, CaloriesPolicy::default());

        let entry = LogEntry::food(42, "2024-03-01 08:00", "apple", 95);
        backend.append(&entry).unwrap();
        assert_eq!(state.records.lock().unwrap()[0]["food"], "apple");

        let outcome = backend.read_all().unwrap();
        assert_eq!(outcome.entries, vec![entry]);
    }

    #[test]
    fn test_remote_table_overwrite() {
        let rt = Runtime::new().unwrap();
        let state = state_with_token("t0k3n");
        let base = spawn_server(&rt, state.clone());

        let table = HttpRemoteTable::new(&base, creds("t0k3n"), rt.handle().clone()).unwrap();
        let mut backend = RemoteTableBackend::new(table, CaloriesPolicy::default());

        let entries = vec![
            LogEntry::food(1, "2024-03-01 08:00", "egg", 70),
            LogEntry::photo(2, "2024-03-01 09:00", "p.jpg"),
        ];
        backend.write_all(&entries).unwrap();
        assert_eq!(state.records.lock().unwrap().len(), 2);
        assert_eq!(backend.read_all().unwrap().entries, entries);
    }

    #[test]
    fn test_expired_token_is_refreshed_from_file() {
        let rt = Runtime::new().unwrap();
        let state = state_with_token("fresh");
        let base = spawn_server(&rt, state.clone());

        let dir = tempfile::TempDir::new().unwrap();
        let token_file = dir.path().join("token");
        std::fs::write(&token_file, "stale\n").unwrap();

        let table = HttpRemoteTable::new(
            &base,
            Credentials::new(None, Some(token_file.clone())),
            rt.handle().clone(),
        )
        .unwrap();

        let err = table.fetch_all_records().unwrap_err();
        assert!(matches!(err, BackendError::AuthExpired(_)));

        // An external login rewrote the token; the retry picks it up.
        std::fs::write(&token_file, "fresh\n").unwrap();
        let mut backend = RemoteTableBackend::new(table, CaloriesPolicy::default());
        backend
            .append(&LogEntry::food(1, "2024-03-01 08:00", "egg", 70))
            .unwrap();
        assert_eq!(state.records.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_server_error_is_transient() {
        let rt = Runtime::new().unwrap();
        let state = state_with_token("t");
        *state.fail_with.lock().unwrap() = Some(StatusCode::INTERNAL_SERVER_ERROR);
        let base = spawn_server(&rt, state);

        let table = HttpRemoteTable::new(&base, creds("t"), rt.handle().clone()).unwrap();
        let mut backend = RemoteTableBackend::new(table, CaloriesPolicy::default());
        let err = backend.read_all().unwrap_err();
        assert!(matches!(err, BackendError::TransientIo(_)));
    }

    #[test]
    fn test_unreachable_host_is_unavailable() {
        let rt = Runtime::new().unwrap();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let table =
            HttpRemoteTable::new(&format!("http://{addr}"), creds("t"), rt.handle().clone())
                .unwrap();
        let err = table.fetch_all_records().unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    #[test]
    fn test_file_store_upload_download() {
        let rt = Runtime::new().unwrap();
        let state = state_with_token("t");
        let base = spawn_server(&rt, state.clone());

        let store = HttpFileStore::new(&base, &creds("t"), rt.handle().clone()).unwrap();
        assert_eq!(store.download("user_logs.csv").unwrap(), None);

        store.upload("user_logs.csv", b"user_id,time\n").unwrap();
        assert_eq!(
            store.download("user_logs.csv").unwrap().as_deref(),
            Some(b"user_id,time\n".as_slice())
        );
        assert!(state.files.lock().unwrap().contains_key("user_logs.csv"));
    }

    #[test]
    fn test_file_store_rejects_bad_token() {
        let rt = Runtime::new().unwrap();
        let base = spawn_server(&rt, state_with_token("right"));

        let store = HttpFileStore::new(&base, &creds("wrong"), rt.handle().clone()).unwrap();
        let err = store.upload("x.csv", b"").unwrap_err();
        assert!(matches!(err, BackendError::AuthExpired(_)));
    }
}
