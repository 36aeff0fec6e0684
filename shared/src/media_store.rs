use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::capabilities::{LibraryOperation, LibraryOutput, LibraryResponse};
use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Stored payload. Images arrive as data URLs, videos as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaContent {
    DataUrl(String),
    Binary(#[serde(with = "serde_bytes")] Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedMedia {
    pub kind: MediaKind,
    pub content: MediaContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    pub owner: String,
    pub kind: MediaKind,
    pub content: MediaContent,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaPage {
    pub items: Vec<MediaItem>,
    pub has_more: bool,
}

/// Append-only per-owner media history.
///
/// Pages are 1-based and ordered newest first (timestamp, then id, both
/// descending). A page past the end is empty with `has_more == false`.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    async fn append(
        &self,
        owner: &str,
        kind: MediaKind,
        content: MediaContent,
    ) -> Result<MediaId, StorageError>;

    async fn page(&self, owner: &str, page: u32, page_size: u32)
        -> Result<MediaPage, StorageError>;

    /// Direct lookup. Does not check who owns the item.
    async fn get_by_id(&self, id: MediaId) -> Result<Option<MediaItem>, StorageError>;
}

fn check_page(page: u32, page_size: u32) -> Result<u64, StorageError> {
    if page == 0 || page_size == 0 {
        return Err(StorageError::InvalidPage { page, page_size });
    }
    Ok(u64::from(page - 1) * u64::from(page_size))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

struct MemoryState {
    next_id: u64,
    items: Vec<MediaItem>,
}

/// In-process store, used by the web shell adaptor and in tests.
pub struct MemoryMediaStore {
    state: RwLock<MemoryState>,
    clock: Clock,
}

impl Default for MemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self::with_clock(now_millis)
    }

    pub fn with_clock(clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                next_id: 1,
                items: Vec::new(),
            }),
            clock: Box::new(clock),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl MediaStore for MemoryMediaStore {
    async fn append(
        &self,
        owner: &str,
        kind: MediaKind,
        content: MediaContent,
    ) -> Result<MediaId, StorageError> {
        let timestamp = (self.clock)();
        let mut state = self.state.write().await;
        let id = MediaId(state.next_id);
        state.next_id += 1;
        state.items.push(MediaItem {
            id,
            owner: owner.to_string(),
            kind,
            content,
            timestamp,
        });
        Ok(id)
    }

    async fn page(
        &self,
        owner: &str,
        page: u32,
        page_size: u32,
    ) -> Result<MediaPage, StorageError> {
        let offset = usize::try_from(check_page(page, page_size)?)
            .map_err(|_| StorageError::InvalidPage { page, page_size })?;
        let size = page_size as usize;

        let state = self.state.read().await;
        let mut owned: Vec<&MediaItem> = state.items.iter().filter(|i| i.owner == owner).collect();
        owned.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        let mut window: Vec<MediaItem> = owned
            .into_iter()
            .skip(offset)
            .take(size + 1)
            .cloned()
            .collect();
        let has_more = window.len() > size;
        window.truncate(size);
        Ok(MediaPage {
            items: window,
            has_more,
        })
    }

    async fn get_by_id(&self, id: MediaId) -> Result<Option<MediaItem>, StorageError> {
        let state = self.state.read().await;
        Ok(state.items.iter().find(|i| i.id == id).cloned())
    }
}

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
pub use self::sqlite::SqliteMediaStore;

#[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
mod sqlite {
    use std::path::Path;

    use rusqlite::{params, Connection, OptionalExtension};
    use tokio::sync::Mutex;

    use super::{
        check_page, now_millis, MediaContent, MediaId, MediaItem, MediaKind, MediaPage,
        MediaStore,
    };
    use crate::error::StorageError;

    const ENCODING_DATA_URL: &str = "data_url";
    const ENCODING_BINARY: &str = "binary";

    fn storage_err(e: rusqlite::Error) -> StorageError {
        StorageError::Unavailable(e.to_string())
    }

    /// On-disk media history for native shells.
    pub struct SqliteMediaStore {
        conn: Mutex<Connection>,
    }

    impl SqliteMediaStore {
        pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
            let conn = Connection::open(path).map_err(storage_err)?;
            Self::init(conn)
        }

        pub fn open_in_memory() -> Result<Self, StorageError> {
            let conn = Connection::open_in_memory().map_err(storage_err)?;
            Self::init(conn)
        }

        fn init(conn: Connection) -> Result<Self, StorageError> {
            conn.execute_batch(
                r"
                CREATE TABLE IF NOT EXISTS media (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    encoding TEXT NOT NULL,
                    content BLOB NOT NULL,
                    timestamp INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_media_owner_time
                    ON media(owner, timestamp DESC, id DESC);
                ",
            )
            .map_err(storage_err)?;
            Ok(Self {
                conn: Mutex::new(conn),
            })
        }
    }

    fn decode_row(
        id: i64,
        owner: String,
        kind: &str,
        encoding: &str,
        content: Vec<u8>,
        timestamp: i64,
    ) -> Result<MediaItem, StorageError> {
        let corrupt = |reason: String| StorageError::Corrupt {
            key: format!("media:{id}"),
            reason,
        };
        let kind = MediaKind::parse(kind).ok_or_else(|| corrupt(format!("unknown kind `{kind}`")))?;
        let content = match encoding {
            ENCODING_DATA_URL => MediaContent::DataUrl(
                String::from_utf8(content).map_err(|e| corrupt(e.to_string()))?,
            ),
            ENCODING_BINARY => MediaContent::Binary(content),
            other => return Err(corrupt(format!("unknown encoding `{other}`"))),
        };
        let id = u64::try_from(id).map_err(|e| corrupt(e.to_string()))?;
        Ok(MediaItem {
            id: MediaId(id),
            owner,
            kind,
            content,
            timestamp,
        })
    }

    type Row = (i64, String, String, String, Vec<u8>, i64);

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    #[async_trait::async_trait]
    impl MediaStore for SqliteMediaStore {
        async fn append(
            &self,
            owner: &str,
            kind: MediaKind,
            content: MediaContent,
        ) -> Result<MediaId, StorageError> {
            let (encoding, bytes) = match content {
                MediaContent::DataUrl(url) => (ENCODING_DATA_URL, url.into_bytes()),
                MediaContent::Binary(bytes) => (ENCODING_BINARY, bytes),
            };
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO media (owner, kind, encoding, content, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![owner, kind.as_str(), encoding, bytes, now_millis()],
            )
            .map_err(storage_err)?;
            let id = u64::try_from(conn.last_insert_rowid())
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
            Ok(MediaId(id))
        }

        async fn page(
            &self,
            owner: &str,
            page: u32,
            page_size: u32,
        ) -> Result<MediaPage, StorageError> {
            let offset = i64::try_from(check_page(page, page_size)?)
                .map_err(|_| StorageError::InvalidPage { page, page_size })?;
            let size = page_size as usize;

            let conn = self.conn.lock().await;
            let mut stmt = conn
                .prepare(
                    "SELECT id, owner, kind, encoding, content, timestamp FROM media
                     WHERE owner = ?1
                     ORDER BY timestamp DESC, id DESC
                     LIMIT ?2 OFFSET ?3",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(params![owner, i64::from(page_size) + 1, offset], read_row)
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<Row>>>()
                .map_err(storage_err)?;

            let mut items = rows
                .into_iter()
                .map(|(id, owner, kind, encoding, content, ts)| {
                    decode_row(id, owner, &kind, &encoding, content, ts)
                })
                .collect::<Result<Vec<_>, _>>()?;
            let has_more = items.len() > size;
            items.truncate(size);
            Ok(MediaPage { items, has_more })
        }

        async fn get_by_id(&self, id: MediaId) -> Result<Option<MediaItem>, StorageError> {
            let Ok(rowid) = i64::try_from(id.0) else {
                return Ok(None);
            };
            let conn = self.conn.lock().await;
            let row = conn
                .query_row(
                    "SELECT id, owner, kind, encoding, content, timestamp FROM media WHERE id = ?1",
                    params![rowid],
                    read_row,
                )
                .optional()
                .map_err(storage_err)?;
            row.map(|(id, owner, kind, encoding, content, ts)| {
                decode_row(id, owner, &kind, &encoding, content, ts)
            })
            .transpose()
        }
    }
}

/// Executes a library request from the core against a store.
pub async fn serve_library<S>(store: &S, operation: LibraryOperation) -> LibraryOutput
where
    S: MediaStore + ?Sized,
{
    match operation {
        LibraryOperation::Append { owner, items } => {
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                ids.push(store.append(&owner, item.kind, item.content).await?);
            }
            Ok(LibraryResponse::Appended(ids))
        }
        LibraryOperation::Page {
            owner,
            page,
            page_size,
        } => Ok(LibraryResponse::Page(store.page(&owner, page, page_size).await?)),
        LibraryOperation::Get { owner, id } => {
            let item = store.get_by_id(id).await?.filter(|item| item.owner == owner);
            Ok(LibraryResponse::Item(item))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    fn ticking_store() -> MemoryMediaStore {
        let tick = Arc::new(AtomicI64::new(1_700_000_000_000));
        MemoryMediaStore::with_clock(move || tick.fetch_add(1, Ordering::SeqCst))
    }

    fn image(n: usize) -> MediaContent {
        MediaContent::DataUrl(format!("data:image/png;base64,{n}"))
    }

    #[tokio::test]
    async fn pages_are_newest_first() {
        let store = ticking_store();
        for n in 0..5 {
            store.append("a@b.co", MediaKind::Image, image(n)).await.unwrap();
        }
        store.append("other@b.co", MediaKind::Image, image(99)).await.unwrap();

        let first = store.page("a@b.co", 1, 2).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.items[0].content, image(4));
        assert_eq!(first.items[1].content, image(3));

        let last = store.page("a@b.co", 3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);

        let beyond = store.page("a@b.co", 9, 2).await.unwrap();
        assert!(beyond.items.is_empty());
        assert!(!beyond.has_more);
    }

    #[tokio::test]
    async fn same_timestamp_breaks_ties_by_id() {
        let store = MemoryMediaStore::with_clock(|| 42);
        let a = store.append("a@b.co", MediaKind::Image, image(1)).await.unwrap();
        let b = store.append("a@b.co", MediaKind::Image, image(2)).await.unwrap();
        let page = store.page("a@b.co", 1, 15).await.unwrap();
        assert_eq!(page.items[0].id, b);
        assert_eq!(page.items[1].id, a);
    }

    #[tokio::test]
    async fn page_zero_is_rejected() {
        let store = ticking_store();
        assert_eq!(
            store.page("a@b.co", 0, 15).await,
            Err(StorageError::InvalidPage {
                page: 0,
                page_size: 15
            })
        );
        assert!(store.page("a@b.co", 1, 0).await.is_err());
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_lookup_ignores_owner() {
        let store = ticking_store();
        let first = store.append("a@b.co", MediaKind::Image, image(1)).await.unwrap();
        let second = store
            .append("z@b.co", MediaKind::Video, MediaContent::Binary(vec![0, 1, 2]))
            .await
            .unwrap();
        assert!(second > first);
        let item = store.get_by_id(second).await.unwrap().unwrap();
        assert_eq!(item.owner, "z@b.co");
        assert_eq!(item.kind, MediaKind::Video);
        assert!(store.get_by_id(MediaId(999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn served_lookup_checks_owner() {
        let store = ticking_store();
        let id = store.append("a@b.co", MediaKind::Image, image(1)).await.unwrap();

        let mine = serve_library(
            &store,
            LibraryOperation::Get {
                owner: "a@b.co".into(),
                id,
            },
        )
        .await
        .unwrap();
        assert!(matches!(mine, LibraryResponse::Item(Some(_))));

        let theirs = serve_library(
            &store,
            LibraryOperation::Get {
                owner: "x@b.co".into(),
                id,
            },
        )
        .await
        .unwrap();
        assert_eq!(theirs, LibraryResponse::Item(None));
    }

    /// Accepts `room` appends, then reports a full quota.
    struct FillingStore {
        inner: MemoryMediaStore,
        room: AtomicI64,
    }

    #[async_trait::async_trait]
    impl MediaStore for FillingStore {
        async fn append(
            &self,
            owner: &str,
            kind: MediaKind,
            content: MediaContent,
        ) -> Result<MediaId, StorageError> {
            if self.room.fetch_sub(1, Ordering::SeqCst) <= 0 {
                return Err(StorageError::QuotaExceeded);
            }
            self.inner.append(owner, kind, content).await
        }

        async fn page(
            &self,
            owner: &str,
            page: u32,
            page_size: u32,
        ) -> Result<MediaPage, StorageError> {
            self.inner.page(owner, page, page_size).await
        }

        async fn get_by_id(&self, id: MediaId) -> Result<Option<MediaItem>, StorageError> {
            self.inner.get_by_id(id).await
        }
    }

    #[tokio::test]
    async fn partial_append_fails_but_keeps_earlier_items() {
        let store = FillingStore {
            inner: ticking_store(),
            room: AtomicI64::new(1),
        };
        let out = serve_library(
            &store,
            LibraryOperation::Append {
                owner: "a@b.co".into(),
                items: vec![
                    GeneratedMedia {
                        kind: MediaKind::Image,
                        content: image(1),
                    },
                    GeneratedMedia {
                        kind: MediaKind::Image,
                        content: image(2),
                    },
                ],
            },
        )
        .await;
        assert_eq!(out, Err(StorageError::QuotaExceeded));

        // Append-only: the first item stays, the save as a whole reports failure.
        let page = store.page("a@b.co", 1, 15).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].content, image(1));
    }

    #[tokio::test]
    async fn served_append_stores_every_item() {
        let store = ticking_store();
        let out = serve_library(
            &store,
            LibraryOperation::Append {
                owner: "a@b.co".into(),
                items: vec![
                    GeneratedMedia {
                        kind: MediaKind::Image,
                        content: image(1),
                    },
                    GeneratedMedia {
                        kind: MediaKind::Image,
                        content: image(2),
                    },
                ],
            },
        )
        .await
        .unwrap();
        assert!(matches!(out, LibraryResponse::Appended(ref ids) if ids.len() == 2));
        assert_eq!(store.len().await, 2);
    }

    #[cfg(all(feature = "sqlite", not(target_arch = "wasm32")))]
    #[tokio::test]
    async fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media.db");
        {
            let store = SqliteMediaStore::open(&path).unwrap();
            store.append("a@b.co", MediaKind::Image, image(1)).await.unwrap();
            store
                .append("a@b.co", MediaKind::Video, MediaContent::Binary(vec![7; 16]))
                .await
                .unwrap();
        }
        let store = SqliteMediaStore::open(&path).unwrap();
        let page = store.page("a@b.co", 1, 1).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.has_more);
        assert_eq!(page.items[0].kind, MediaKind::Video);
        assert_eq!(page.items[0].content, MediaContent::Binary(vec![7; 16]));

        let rest = store.page("a@b.co", 2, 1).await.unwrap();
        assert_eq!(rest.items[0].content, image(1));
        assert!(!rest.has_more);
        assert!(store.page("a@b.co", 0, 1).await.is_err());
    }

    proptest! {
        #[test]
        fn pages_partition_owner_items(n in 0usize..40, page_size in 1u32..8, noise in 0usize..5) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryMediaStore::with_clock(|| 7);
                for i in 0..n {
                    store.append("o@x.co", MediaKind::Image, image(i)).await.unwrap();
                    if i < noise {
                        store.append("n@x.co", MediaKind::Image, image(i)).await.unwrap();
                    }
                }

                let pages = (n as u32).div_ceil(page_size).max(1);
                let mut seen = HashSet::new();
                let mut previous: Option<MediaId> = None;
                for p in 1..=pages {
                    let page = store.page("o@x.co", p, page_size).await.unwrap();
                    prop_assert_eq!(page.has_more, p < pages && n > 0);
                    for item in page.items {
                        prop_assert_eq!(&item.owner, "o@x.co");
                        if let Some(prev) = previous {
                            prop_assert!(item.id < prev);
                        }
                        previous = Some(item.id);
                        prop_assert!(seen.insert(item.id));
                    }
                }
                prop_assert_eq!(seen.len(), n);
                Ok(())
            })?;
        }
    }
}
