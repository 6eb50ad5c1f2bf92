use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracklog_core::{LocalId, RemoteDto, SyncRecord, Window};
use tracklog_infra::{Filter, RestClient, RestError};

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error("row {0} not found")]
    NotFound(LocalId),
    #[error("invalid row: {0}")]
    Decode(String),
    #[error("remote unavailable: {0}")]
    Unavailable(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Rest(e) => e.is_not_found(),
            _ => false,
        }
    }

    fn from_rest(err: RestError, id: Option<LocalId>) -> Self {
        match (err, id) {
            (RestError::NotFound, Some(id)) => Self::NotFound(id),
            (RestError::Decode(message), _) => Self::Decode(message),
            (other, _) => Self::Rest(other),
        }
    }
}

/// CRUD contract for one remote entity collection.
#[async_trait::async_trait]
pub trait RemoteCollection<R: SyncRecord>: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, include_archived: bool) -> Result<Vec<R::Dto>, RemoteError>;

    /// Rows whose end is null or after the window start, and whose start is
    /// before the window end.
    async fn fetch_for_window(&self, window: &Window) -> Result<Vec<R::Dto>, RemoteError>;

    /// Returns the stored row, carrying its permanent id.
    async fn create(&self, payload: &R::Payload) -> Result<R::Dto, RemoteError>;

    async fn update(&self, id: LocalId, payload: &R::Payload) -> Result<R::Dto, RemoteError>;

    /// `Ok(false)` when the row was already gone.
    async fn delete(&self, id: LocalId) -> Result<bool, RemoteError>;
}

#[async_trait::async_trait]
impl<R, T> RemoteCollection<R> for Arc<T>
where
    R: SyncRecord,
    T: RemoteCollection<R> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, include_archived: bool) -> Result<Vec<R::Dto>, RemoteError> {
        (**self).fetch(include_archived).await
    }

    async fn fetch_for_window(&self, window: &Window) -> Result<Vec<R::Dto>, RemoteError> {
        (**self).fetch_for_window(window).await
    }

    async fn create(&self, payload: &R::Payload) -> Result<R::Dto, RemoteError> {
        (**self).create(payload).await
    }

    async fn update(&self, id: LocalId, payload: &R::Payload) -> Result<R::Dto, RemoteError> {
        (**self).update(id, payload).await
    }

    async fn delete(&self, id: LocalId) -> Result<bool, RemoteError> {
        (**self).delete(id).await
    }
}

/// Collection served by the REST backend.
pub struct HttpCollection<R> {
    client: Arc<RestClient>,
    name: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: SyncRecord> HttpCollection<R> {
    pub fn new(client: Arc<RestClient>, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            _record: PhantomData,
        }
    }

    pub fn with_default_name(client: Arc<RestClient>) -> Self {
        Self::new(client, R::KIND.default_collection())
    }
}

#[async_trait::async_trait]
impl<R: SyncRecord> RemoteCollection<R> for HttpCollection<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, include_archived: bool) -> Result<Vec<R::Dto>, RemoteError> {
        let mut filters = Vec::new();
        if R::ARCHIVABLE && !include_archived {
            filters.push(Filter::eq("archived", false));
        }
        self.client
            .select(&self.name, &filters)
            .await
            .map_err(|e| RemoteError::from_rest(e, None))
    }

    async fn fetch_for_window(&self, window: &Window) -> Result<Vec<R::Dto>, RemoteError> {
        let columns = R::SPAN_COLUMNS.ok_or_else(|| {
            RemoteError::Rejected(format!("{} rows carry no time range", R::KIND))
        })?;
        let filters = [
            Filter::null_or_gt(columns.end, window.start()),
            Filter::lt(columns.start, window.end()),
        ];
        self.client
            .select(&self.name, &filters)
            .await
            .map_err(|e| RemoteError::from_rest(e, None))
    }

    async fn create(&self, payload: &R::Payload) -> Result<R::Dto, RemoteError> {
        self.client
            .insert(&self.name, payload)
            .await
            .map_err(|e| RemoteError::from_rest(e, None))
    }

    async fn update(&self, id: LocalId, payload: &R::Payload) -> Result<R::Dto, RemoteError> {
        self.client
            .update(&self.name, id, payload)
            .await
            .map_err(|e| RemoteError::from_rest(e, Some(id)))
    }

    async fn delete(&self, id: LocalId) -> Result<bool, RemoteError> {
        self.client
            .delete(&self.name, id)
            .await
            .map_err(|e| RemoteError::from_rest(e, Some(id)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    Fetch { include_archived: bool },
    FetchWindow,
    Create,
    Update(LocalId),
    Delete(LocalId),
}

type RowPredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

struct MemoryRows {
    rows: BTreeMap<LocalId, Value>,
    next_id: LocalId,
    offline: bool,
    refuse_create: Option<RowPredicate>,
    calls: Vec<RemoteCall>,
}

/// Collection kept in process, holding rows as JSON the way a server would.
///
/// Used for offline demos and tests: ids are assigned on create, window and
/// archived filters follow the server's semantics, and failures can be
/// injected per call.
pub struct InMemoryCollection<R> {
    name: String,
    state: Mutex<MemoryRows>,
    _record: PhantomData<fn() -> R>,
}

impl<R: SyncRecord> Default for InMemoryCollection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SyncRecord> InMemoryCollection<R> {
    pub fn new() -> Self {
        Self {
            name: R::KIND.default_collection().to_string(),
            state: Mutex::new(MemoryRows {
                rows: BTreeMap::new(),
                next_id: 1,
                offline: false,
                refuse_create: None,
                calls: Vec::new(),
            }),
            _record: PhantomData,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRows> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next id handed out by `create`.
    pub fn with_next_id(self, id: LocalId) -> Self {
        self.lock().next_id = id;
        self
    }

    pub fn put(&self, dto: &R::Dto) {
        let value = serde_json::to_value(dto).unwrap_or(Value::Null);
        self.put_raw(dto.id(), value);
    }

    /// Stores a row verbatim, even one that won't decode.
    pub fn put_raw(&self, id: LocalId, value: Value) {
        let mut state = self.lock();
        state.rows.insert(id, value);
        if id >= state.next_id {
            state.next_id = id + 1;
        }
    }

    pub fn remove(&self, id: LocalId) -> Option<Value> {
        self.lock().rows.remove(&id)
    }

    pub fn row(&self, id: LocalId) -> Option<Value> {
        self.lock().rows.get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<LocalId> {
        self.lock().rows.keys().copied().collect()
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Rejects creates whose payload matches `predicate`.
    pub fn refuse_create_when(&self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) {
        self.lock().refuse_create = Some(Box::new(predicate));
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    fn begin(&self, call: RemoteCall) -> Result<MutexGuard<'_, MemoryRows>, RemoteError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.offline {
            return Err(RemoteError::Unavailable(format!("{} is offline", self.name)));
        }
        Ok(state)
    }

    fn decode(value: &Value) -> Result<R::Dto, RemoteError> {
        serde_json::from_value(value.clone()).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    fn encode(payload: &R::Payload) -> Result<Value, RemoteError> {
        match serde_json::to_value(payload) {
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(other) => Err(RemoteError::Rejected(format!("payload is not an object: {other}"))),
            Err(e) => Err(RemoteError::Rejected(e.to_string())),
        }
    }
}

fn column_time(row: &Value, column: &str) -> Option<DateTime<Utc>> {
    row.get(column)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait::async_trait]
impl<R: SyncRecord> RemoteCollection<R> for InMemoryCollection<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, include_archived: bool) -> Result<Vec<R::Dto>, RemoteError> {
        let state = self.begin(RemoteCall::Fetch { include_archived })?;
        state
            .rows
            .values()
            .filter(|row| {
                include_archived
                    || !R::ARCHIVABLE
                    || !row.get("archived").and_then(Value::as_bool).unwrap_or(false)
            })
            .map(Self::decode)
            .collect()
    }

    async fn fetch_for_window(&self, window: &Window) -> Result<Vec<R::Dto>, RemoteError> {
        let state = self.begin(RemoteCall::FetchWindow)?;
        let columns = R::SPAN_COLUMNS.ok_or_else(|| {
            RemoteError::Rejected(format!("{} rows carry no time range", R::KIND))
        })?;
        state
            .rows
            .values()
            .filter(|row| {
                let Some(start) = column_time(row, columns.start) else {
                    return false;
                };
                let end = column_time(row, columns.end);
                end.map_or(true, |end| end > window.start()) && start < window.end()
            })
            .map(Self::decode)
            .collect()
    }

    async fn create(&self, payload: &R::Payload) -> Result<R::Dto, RemoteError> {
        let mut state = self.begin(RemoteCall::Create)?;
        let mut value = Self::encode(payload)?;
        if state.refuse_create.as_ref().is_some_and(|refuse| refuse(&value)) {
            return Err(RemoteError::Rejected("create refused".into()));
        }
        let id = state.next_id;
        value["id"] = Value::from(id);
        let dto = Self::decode(&value)?;
        state.next_id += 1;
        state.rows.insert(id, value);
        Ok(dto)
    }

    async fn update(&self, id: LocalId, payload: &R::Payload) -> Result<R::Dto, RemoteError> {
        let mut state = self.begin(RemoteCall::Update(id))?;
        let patch = Self::encode(payload)?;
        let row = state.rows.get_mut(&id).ok_or(RemoteError::NotFound(id))?;
        if let (Value::Object(row), Value::Object(patch)) = (row, patch) {
            row.extend(patch);
        }
        let row = state.rows.get(&id).ok_or(RemoteError::NotFound(id))?;
        Self::decode(row)
    }

    async fn delete(&self, id: LocalId) -> Result<bool, RemoteError> {
        let mut state = self.begin(RemoteCall::Delete(id))?;
        Ok(state.rows.remove(&id).is_some())
    }
}
