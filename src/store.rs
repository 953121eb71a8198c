//! Remote store client — object store (image bytes) + document store
//! (submission records) behind one HTTP base URL.
//!
//! All network work runs on a background thread with its own Tokio runtime.
//! The UI sends [`StoreCommand`]s and polls [`StoreEvent`]s once per frame;
//! nothing here ever blocks the UI thread, and no in-flight operation is
//! cancelled — stale completions are tagged with a load generation and
//! discarded by the receiver.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::components::gallery::GalleryRecord;
use crate::{log_err, log_info};

// ============================================================================
// ERRORS
// ============================================================================

/// Failure taxonomy for store operations. `LimitReached` is a policy
/// rejection, not a transport error.
#[derive(Debug, Clone)]
pub enum StoreError {
    Upload(String),
    RecordCreate(String),
    List(String),
    /// URL resolution / image fetch failure for a single item.
    Resolve { key: String, reason: String },
    /// The object store has no object under the key.
    NotFound { key: String },
    LimitReached { count: u64, limit: u64 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Upload(e) => write!(f, "upload failed: {}", e),
            StoreError::RecordCreate(e) => write!(f, "record create failed: {}", e),
            StoreError::List(e) => write!(f, "record listing failed: {}", e),
            StoreError::Resolve { key, reason } => {
                write!(f, "could not resolve {}: {}", key, reason)
            }
            StoreError::NotFound { key } => write!(f, "no object stored under {}", key),
            StoreError::LimitReached { count, limit } => {
                write!(f, "record limit reached ({} of {})", count, limit)
            }
        }
    }
}

impl std::error::Error for StoreError {}

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Fields of a new submission record.
#[derive(Serialize)]
struct NewRecord<'a> {
    path: &'a str,
    timestamp: i64,
    author: &'a str,
}

#[derive(Deserialize)]
struct UrlDoc {
    url: String,
}

#[derive(Deserialize)]
struct CountDoc {
    count: u64,
}

#[derive(Deserialize)]
struct IdDoc {
    id: String,
}

/// A raster decoded on the worker, ready for texture upload on the UI thread.
pub struct DecodedImage {
    pub width: usize,
    pub height: usize,
    /// RGBA, row-major, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

// ============================================================================
// COMMANDS / EVENTS
// ============================================================================

#[derive(Debug)]
pub enum StoreCommand {
    /// Upload a finished drawing and create its record. The ceiling is
    /// checked first; when hit, no upload is attempted.
    Submit {
        key: String,
        /// Base64 data-URL of the PNG raster.
        payload: String,
        timestamp_ms: i64,
        author: String,
        limit: u64,
    },
    /// Fetch the newest `limit` records, then resolve each one's image.
    Reload { generation: u64, limit: u32 },
    /// Fetch one curated-playlist image (local path or URL).
    FetchPlaylistImage {
        list: usize,
        index: usize,
        src: String,
    },
    Shutdown,
}

pub enum StoreEvent {
    Submitted,
    SubmitFailed(StoreError),
    LimitReached { count: u64, limit: u64 },
    Listed {
        generation: u64,
        records: Vec<GalleryRecord>,
    },
    ListFailed {
        generation: u64,
        error: StoreError,
    },
    /// One gallery entry's image arrived (per-item, unordered).
    ItemResolved {
        generation: u64,
        index: usize,
        image: DecodedImage,
    },
    ItemResolveFailed {
        generation: u64,
        index: usize,
        error: StoreError,
    },
    PlaylistImage {
        list: usize,
        index: usize,
        result: Result<DecodedImage, String>,
    },
}

// ============================================================================
// HTTP CLIENT
// ============================================================================

#[derive(Clone)]
struct StoreClient {
    http: reqwest::Client,
    base: String,
    collection: String,
}

impl StoreClient {
    fn object_url(&self, key: &str) -> String {
        format!("{}/objects/{}", self.base, key)
    }

    fn collection_url(&self, tail: &str) -> String {
        format!("{}/collections/{}/{}", self.base, self.collection, tail)
    }

    /// `upload(key, payload)` — store an encoded payload under a key.
    async fn upload(&self, key: &str, payload: String) -> Result<(), StoreError> {
        let resp = self
            .http
            .put(self.object_url(key))
            .body(payload)
            .send()
            .await
            .map_err(|e| StoreError::Upload(e.to_string()))?;
        resp.error_for_status()
            .map_err(|e| StoreError::Upload(e.to_string()))?;
        Ok(())
    }

    /// `resolveURL(key)` — fails with `NotFound` when the key has no object.
    async fn resolve_url(&self, key: &str) -> Result<String, StoreError> {
        let resp = self
            .http
            .get(format!("{}/url", self.object_url(key)))
            .send()
            .await
            .map_err(|e| StoreError::Resolve {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        let doc: UrlDoc = resp
            .error_for_status()
            .map_err(|e| StoreError::Resolve {
                key: key.to_string(),
                reason: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| StoreError::Resolve {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(doc.url)
    }

    /// `addRecord(fields)` — returns the new record id.
    async fn add_record(&self, fields: &NewRecord<'_>) -> Result<String, StoreError> {
        let doc: IdDoc = self
            .http
            .post(self.collection_url("records"))
            .json(fields)
            .send()
            .await
            .map_err(|e| StoreError::RecordCreate(e.to_string()))?
            .error_for_status()
            .map_err(|e| StoreError::RecordCreate(e.to_string()))?
            .json()
            .await
            .map_err(|e| StoreError::RecordCreate(e.to_string()))?;
        Ok(doc.id)
    }

    /// `listRecords(timestamp desc, limit)`.
    async fn list_records(&self, limit: u32) -> Result<Vec<GalleryRecord>, StoreError> {
        self.http
            .get(self.collection_url("records"))
            .query(&[
                ("order_by", "timestamp"),
                ("dir", "desc"),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::List(e.to_string()))?
            .error_for_status()
            .map_err(|e| StoreError::List(e.to_string()))?
            .json()
            .await
            .map_err(|e| StoreError::List(e.to_string()))
    }

    /// `count()` — current record count for the ceiling check.
    async fn count(&self) -> Result<u64, StoreError> {
        let doc: CountDoc = self
            .http
            .get(self.collection_url("count"))
            .send()
            .await
            .map_err(|e| StoreError::List(e.to_string()))?
            .error_for_status()
            .map_err(|e| StoreError::List(e.to_string()))?
            .json()
            .await
            .map_err(|e| StoreError::List(e.to_string()))?;
        Ok(doc.count)
    }

    /// Fetch the bytes behind a resolved URL.
    async fn fetch_bytes(&self, key: &str, url: &str) -> Result<Vec<u8>, StoreError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::Resolve {
                key: key.to_string(),
                reason: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| StoreError::Resolve {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        Ok(resp
            .bytes()
            .await
            .map_err(|e| StoreError::Resolve {
                key: key.to_string(),
                reason: e.to_string(),
            })?
            .to_vec())
    }
}

fn decode_image(bytes: &[u8]) -> Result<DecodedImage, String> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| format!("image decode error: {}", e))?
        .to_rgba8();
    Ok(DecodedImage {
        width: img.width() as usize,
        height: img.height() as usize,
        rgba: img.into_raw(),
    })
}

// ============================================================================
// STORE HANDLE — UI-side facade over the background worker
// ============================================================================

/// Spawns the background runtime and bridges it to the UI with channels.
/// Commands are fire-and-forget; events are polled once per frame.
pub struct StoreHandle {
    command_tx: mpsc::UnboundedSender<StoreCommand>,
    event_rx: Arc<Mutex<mpsc::UnboundedReceiver<StoreEvent>>>,
}

impl StoreHandle {
    pub fn spawn(base_url: String, collection: String) -> Self {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<StoreCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<StoreEvent>();

        std::thread::spawn(move || {
            let rt = match Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    log_err!("store worker: failed to create runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async move {
                let client = StoreClient {
                    http: reqwest::Client::new(),
                    base: base_url.trim_end_matches('/').to_string(),
                    collection,
                };
                log_info!("store worker up ({})", client.base);

                while let Some(cmd) = command_rx.recv().await {
                    match cmd {
                        StoreCommand::Submit {
                            key,
                            payload,
                            timestamp_ms,
                            author,
                            limit,
                        } => {
                            let client = client.clone();
                            let event_tx = event_tx.clone();
                            tokio::spawn(async move {
                                let event =
                                    run_submit(&client, &key, payload, timestamp_ms, &author, limit)
                                        .await;
                                let _ = event_tx.send(event);
                            });
                        }
                        StoreCommand::Reload { generation, limit } => {
                            let client = client.clone();
                            let event_tx = event_tx.clone();
                            tokio::spawn(async move {
                                run_reload(&client, &event_tx, generation, limit).await;
                            });
                        }
                        StoreCommand::FetchPlaylistImage { list, index, src } => {
                            let client = client.clone();
                            let event_tx = event_tx.clone();
                            tokio::spawn(async move {
                                let result = fetch_playlist_image(&client, &src).await;
                                let _ = event_tx.send(StoreEvent::PlaylistImage {
                                    list,
                                    index,
                                    result,
                                });
                            });
                        }
                        StoreCommand::Shutdown => break,
                    }
                }
            });
        });

        Self {
            command_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    pub fn send(&self, cmd: StoreCommand) {
        if self.command_tx.send(cmd).is_err() {
            log_err!("store worker is gone; command dropped");
        }
    }

    /// Drain pending events (non-blocking).
    pub fn poll_events(&self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        if let Ok(mut rx) = self.event_rx.lock() {
            while let Ok(event) = rx.try_recv() {
                events.push(event);
            }
        }
        events
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(StoreCommand::Shutdown);
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// WORKER OPERATIONS
// ============================================================================

/// Ceiling check, upload, record create — in that order, stopping at the
/// first failure. The ceiling refusal happens before any storage traffic
/// for the image itself.
async fn run_submit(
    client: &StoreClient,
    key: &str,
    payload: String,
    timestamp_ms: i64,
    author: &str,
    limit: u64,
) -> StoreEvent {
    let count = match client.count().await {
        Ok(n) => n,
        Err(e) => {
            log_err!("submit: count check failed: {}", e);
            return StoreEvent::SubmitFailed(e);
        }
    };
    if count >= limit {
        log_info!("submit refused: {} records >= limit {}", count, limit);
        return StoreEvent::LimitReached { count, limit };
    }

    if let Err(e) = client.upload(key, payload).await {
        log_err!("submit: {}", e);
        return StoreEvent::SubmitFailed(e);
    }
    let fields = NewRecord {
        path: key,
        timestamp: timestamp_ms,
        author,
    };
    match client.add_record(&fields).await {
        Ok(id) => {
            log_info!("submitted {} (record {})", key, id);
            StoreEvent::Submitted
        }
        Err(e) => {
            log_err!("submit: {}", e);
            StoreEvent::SubmitFailed(e)
        }
    }
}

/// List records, then resolve every record's image concurrently. Item
/// completions arrive in whatever order the network produces them.
async fn run_reload(
    client: &StoreClient,
    event_tx: &mpsc::UnboundedSender<StoreEvent>,
    generation: u64,
    limit: u32,
) {
    let records = match client.list_records(limit).await {
        Ok(records) => records,
        Err(error) => {
            log_err!("gallery load: {}", error);
            let _ = event_tx.send(StoreEvent::ListFailed { generation, error });
            return;
        }
    };
    log_info!("gallery load: {} records (generation {})", records.len(), generation);

    let paths: Vec<String> = records.iter().map(|r| r.path.clone()).collect();
    let _ = event_tx.send(StoreEvent::Listed {
        generation,
        records,
    });

    for (index, key) in paths.into_iter().enumerate() {
        let client = client.clone();
        let event_tx = event_tx.clone();
        tokio::spawn(async move {
            let event = match resolve_item(&client, &key).await {
                Ok(image) => StoreEvent::ItemResolved {
                    generation,
                    index,
                    image,
                },
                Err(error) => {
                    log_err!("gallery item {}: {}", key, error);
                    StoreEvent::ItemResolveFailed {
                        generation,
                        index,
                        error,
                    }
                }
            };
            let _ = event_tx.send(event);
        });
    }
}

async fn resolve_item(client: &StoreClient, key: &str) -> Result<DecodedImage, StoreError> {
    let url = client.resolve_url(key).await?;
    let bytes = client.fetch_bytes(key, &url).await?;
    decode_image(&bytes).map_err(|reason| StoreError::Resolve {
        key: key.to_string(),
        reason,
    })
}

/// Playlist sources are either plain file paths or http(s) URLs.
async fn fetch_playlist_image(client: &StoreClient, src: &str) -> Result<DecodedImage, String> {
    let bytes = if src.starts_with("http://") || src.starts_with("https://") {
        client
            .fetch_bytes(src, src)
            .await
            .map_err(|e| e.to_string())?
    } else {
        tokio::fs::read(src)
            .await
            .map_err(|e| format!("read {}: {}", src, e))?
    };
    decode_image(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_distinguishes_the_taxonomy() {
        let upload = StoreError::Upload("timeout".into());
        let limit = StoreError::LimitReached {
            count: 300,
            limit: 300,
        };
        let missing = StoreError::NotFound {
            key: "oekaki/x.png".into(),
        };
        assert_eq!(upload.to_string(), "upload failed: timeout");
        assert_eq!(limit.to_string(), "record limit reached (300 of 300)");
        assert_eq!(missing.to_string(), "no object stored under oekaki/x.png");
    }

    #[test]
    fn new_record_serializes_the_store_fields() {
        let fields = NewRecord {
            path: "oekaki/canvas_1_a.png",
            timestamp: 1_700_000_000_000,
            author: "no author",
        };
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "path": "oekaki/canvas_1_a.png",
                "timestamp": 1_700_000_000_000_i64,
                "author": "no author",
            })
        );
    }

    #[test]
    fn record_listing_deserializes() {
        let rows: Vec<GalleryRecord> = serde_json::from_str(
            r#"[
                {"id": "b", "path": "oekaki/b.png", "timestamp": 2000, "author": "mika"},
                {"id": "a", "path": "oekaki/a.png", "timestamp": 1000}
            ]"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].author.as_deref(), Some("mika"));
        assert_eq!(rows[1].timestamp, 1000);
        assert_eq!(rows[1].author, None);
    }

    #[test]
    fn decode_image_rejects_garbage() {
        assert!(decode_image(b"not an image").is_err());
    }

    // ------------------------------------------------------------------
    // Submission pipeline against a local HTTP stub
    // ------------------------------------------------------------------

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP server answering the store endpoints and recording every
    /// `METHOD /path` it serves, so tests can assert which remote calls a
    /// submission actually made.
    async fn spawn_stub(count: u64, hits: Arc<Mutex<Vec<String>>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let hits = hits.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let header_end = loop {
                        let n = match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => n,
                        };
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                            break pos + 4;
                        }
                    };
                    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                    // Drain the declared body before responding
                    let body_len = head
                        .lines()
                        .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
                        .and_then(|l| l.split(':').nth(1))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    while buf.len() < header_end + body_len {
                        let n = match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => n,
                        };
                        buf.extend_from_slice(&chunk[..n]);
                    }

                    let request_line = head.lines().next().unwrap_or_default();
                    let mut parts = request_line.split_whitespace();
                    let method = parts.next().unwrap_or_default().to_string();
                    let path = parts.next().unwrap_or_default().to_string();
                    hits.lock().unwrap().push(format!("{} {}", method, path));

                    let body = match (method.as_str(), path.as_str()) {
                        ("GET", p) if p.ends_with("/count") => format!("{{\"count\":{}}}", count),
                        ("POST", _) => "{\"id\":\"rec-1\"}".to_string(),
                        _ => String::new(),
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        base
    }

    fn stub_client(base: String) -> StoreClient {
        StoreClient {
            http: reqwest::Client::new(),
            base,
            collection: "oekaki".to_string(),
        }
    }

    #[tokio::test]
    async fn submit_at_the_ceiling_is_refused_before_any_upload() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_stub(300, hits.clone()).await;
        let client = stub_client(base);

        let event = run_submit(
            &client,
            "oekaki/canvas_1_a.png",
            "data:image/png;base64,AAAA".to_string(),
            1,
            "no author",
            300,
        )
        .await;

        assert!(matches!(
            event,
            StoreEvent::LimitReached {
                count: 300,
                limit: 300
            }
        ));
        // Only the count check reached the wire: no object upload, no record
        let hits = hits.lock().unwrap();
        assert_eq!(hits.as_slice(), ["GET /collections/oekaki/count"]);
    }

    #[tokio::test]
    async fn confirmed_submit_performs_one_upload_then_one_record_create() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_stub(5, hits.clone()).await;
        let client = stub_client(base);

        let event = run_submit(
            &client,
            "oekaki/canvas_1_a.png",
            "data:image/png;base64,AAAA".to_string(),
            1,
            "mika",
            300,
        )
        .await;

        assert!(matches!(event, StoreEvent::Submitted));
        let hits = hits.lock().unwrap();
        assert_eq!(
            hits.as_slice(),
            [
                "GET /collections/oekaki/count",
                "PUT /objects/oekaki/canvas_1_a.png",
                "POST /collections/oekaki/records",
            ]
        );
    }
}
