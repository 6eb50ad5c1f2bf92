use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{rel, require, require_text};
use crate::{
    EntityKind, Incomplete, LocalId, PayloadBuild, RecordMeta, RelationSpec, Relations,
    RemoteDto, Span, SpanColumns, SyncRecord,
};

const RELATIONS: &[RelationSpec] = &[RelationSpec::optional(rel::VEHICLE, EntityKind::Vehicle)];

/// Top-level time-stamped log entry. Trips and interactions hang off it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub meta: RecordMeta,
    #[serde(default)]
    pub relations: Relations,
    pub title: String,
    pub notes: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Activity {
    pub fn draft(title: impl Into<String>, started_at: Option<DateTime<Utc>>) -> Self {
        Self {
            meta: RecordMeta::default(),
            relations: Relations::new(),
            title: title.into(),
            notes: None,
            started_at,
            ended_at: None,
        }
    }

    pub fn vehicle(&self) -> Option<LocalId> {
        self.relations.key(rel::VEHICLE)
    }

    fn try_payload(&self) -> Result<ActivityPayload, Incomplete> {
        Ok(ActivityPayload {
            title: require_text("title", &self.title)?,
            notes: self.notes.clone(),
            started_at: require("started_at", self.started_at)?,
            ended_at: self.ended_at,
            vehicle_id: self.relations.outbound_key(&RELATIONS[0])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDto {
    pub id: LocalId,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vehicle_id: Option<LocalId>,
}

impl RemoteDto for ActivityDto {
    fn id(&self) -> LocalId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityPayload {
    pub title: String,
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub vehicle_id: Option<LocalId>,
}

impl SyncRecord for Activity {
    type Dto = ActivityDto;
    type Payload = ActivityPayload;

    const KIND: EntityKind = EntityKind::Activity;
    const RELATIONS: &'static [RelationSpec] = RELATIONS;
    const SPAN_COLUMNS: Option<SpanColumns> = Some(SpanColumns {
        start: "started_at",
        end: "ended_at",
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

    fn payload(&self) -> PayloadBuild<ActivityPayload> {
        self.try_payload().into()
    }

    fn from_dto(dto: ActivityDto) -> Self {
        let mut record = Self {
            meta: RecordMeta::synced(dto.id),
            relations: Relations::new(),
            title: String::new(),
            notes: None,
            started_at: None,
            ended_at: None,
        };
        record.update_from(dto);
        record
    }

    fn update_from(&mut self, dto: ActivityDto) {
        self.title = dto.title;
        self.notes = dto.notes;
        self.started_at = Some(dto.started_at);
        self.ended_at = dto.ended_at;
        self.relations.set_key(rel::VEHICLE, dto.vehicle_id);
    }

    fn span(&self) -> Option<Span> {
        self.started_at.map(|start| Span::new(start, self.ended_at))
    }
}
