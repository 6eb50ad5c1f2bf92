use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{rel, require, require_text};
use crate::{
    EntityKind, Incomplete, LocalId, PayloadBuild, RecordMeta, RelationSpec, Relations,
    RemoteDto, Span, SpanColumns, SyncRecord,
};

const RELATIONS: &[RelationSpec] = &[RelationSpec::optional(rel::PERSON, EntityKind::Person)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaEntry {
    pub meta: RecordMeta,
    #[serde(default)]
    pub relations: Relations,
    pub title: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub done: bool,
}

impl AgendaEntry {
    pub fn draft(title: impl Into<String>, starts_at: Option<DateTime<Utc>>) -> Self {
        Self {
            meta: RecordMeta::default(),
            relations: Relations::new(),
            title: title.into(),
            starts_at,
            ends_at: None,
            done: false,
        }
    }

    fn try_payload(&self) -> Result<AgendaEntryPayload, Incomplete> {
        Ok(AgendaEntryPayload {
            title: require_text("title", &self.title)?,
            starts_at: require("starts_at", self.starts_at)?,
            ends_at: self.ends_at,
            done: self.done,
            person_id: self.relations.outbound_key(&RELATIONS[0])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaEntryDto {
    pub id: LocalId,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub person_id: Option<LocalId>,
}

impl RemoteDto for AgendaEntryDto {
    fn id(&self) -> LocalId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgendaEntryPayload {
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub done: bool,
    pub person_id: Option<LocalId>,
}

impl SyncRecord for AgendaEntry {
    type Dto = AgendaEntryDto;
    type Payload = AgendaEntryPayload;

    const KIND: EntityKind = EntityKind::AgendaEntry;
    const RELATIONS: &'static [RelationSpec] = RELATIONS;
    const SPAN_COLUMNS: Option<SpanColumns> = Some(SpanColumns {
        start: "starts_at",
        end: "ends_at",
    });

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn relations(&self) -> &Relations {
        &self.relations
    }

    fn relations_mut(&mut self) -> &mut Relations {
        &mut self.relations
    }

    fn label(&self) -> String {
        self.title.clone()
    }

    fn payload(&self) -> PayloadBuild<AgendaEntryPayload> {
        self.try_payload().into()
    }

    fn from_dto(dto: AgendaEntryDto) -> Self {
        let mut record = Self {
            meta: RecordMeta::synced(dto.id),
            relations: Relations::new(),
            title: String::new(),
            starts_at: None,
            ends_at: None,
            done: false,
        };
        record.update_from(dto);
        record
    }

    fn update_from(&mut self, dto: AgendaEntryDto) {
        self.title = dto.title;
        self.starts_at = Some(dto.starts_at);
        self.ends_at = dto.ends_at;
        self.done = dto.done;
        self.relations.set_key(rel::PERSON, dto.person_id);
    }

    fn span(&self) -> Option<Span> {
        self.starts_at.map(|start| Span::new(start, self.ends_at))
    }
}
