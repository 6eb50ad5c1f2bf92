use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{rel, require};
use crate::{
    EntityKind, Incomplete, LocalId, PayloadBuild, RecordMeta, RelationSpec, Relations,
    RemoteDto, Span, SpanColumns, SyncRecord,
};

const RELATIONS: &[RelationSpec] = &[
    RelationSpec::optional(rel::INSTANCE, EntityKind::Activity),
    RelationSpec::required(rel::PERSON, EntityKind::Person),
];

/// A logged contact with a person, optionally during an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub meta: RecordMeta,
    #[serde(default)]
    pub relations: Relations,
    pub occurred_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub channel: Option<String>,
    pub summary: Option<String>,
}

impl Interaction {
    pub fn draft(person: Option<LocalId>, occurred_at: Option<DateTime<Utc>>) -> Self {
        Self {
            meta: RecordMeta::default(),
            relations: Relations::new().with_key(rel::PERSON, person),
            occurred_at,
            ended_at: None,
            channel: None,
            summary: None,
        }
    }

    pub fn person(&self) -> Option<LocalId> {
        self.relations.key(rel::PERSON)
    }

    pub fn instance(&self) -> Option<LocalId> {
        self.relations.key(rel::INSTANCE)
    }

    fn try_payload(&self) -> Result<InteractionPayload, Incomplete> {
        Ok(InteractionPayload {
            instance_id: self.relations.outbound_key(&RELATIONS[0])?,
            person_id: require(rel::PERSON, self.relations.outbound_key(&RELATIONS[1])?)?,
            occurred_at: require("occurred_at", self.occurred_at)?,
            ended_at: self.ended_at,
            channel: self.channel.clone(),
            summary: self.summary.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionDto {
    pub id: LocalId,
    #[serde(default)]
    pub instance_id: Option<LocalId>,
    #[serde(default)]
    pub person_id: Option<LocalId>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl RemoteDto for InteractionDto {
    fn id(&self) -> LocalId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionPayload {
    pub instance_id: Option<LocalId>,
    pub person_id: LocalId,
    pub occurred_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub channel: Option<String>,
    pub summary: Option<String>,
}

impl SyncRecord for Interaction {
    type Dto = InteractionDto;
    type Payload = InteractionPayload;

    const KIND: EntityKind = EntityKind::Interaction;
    const RELATIONS: &'static [RelationSpec] = RELATIONS;
    const SPAN_COLUMNS: Option<SpanColumns> = Some(SpanColumns {
        start: "occurred_at",
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
        self.summary
            .clone()
            .or_else(|| self.channel.clone())
            .unwrap_or_else(|| "Interaction".to_string())
    }

    fn payload(&self) -> PayloadBuild<InteractionPayload> {
        self.try_payload().into()
    }

    fn from_dto(dto: InteractionDto) -> Self {
        let mut record = Self {
            meta: RecordMeta::synced(dto.id),
            relations: Relations::new(),
            occurred_at: None,
            ended_at: None,
            channel: None,
            summary: None,
        };
        record.update_from(dto);
        record
    }

    fn update_from(&mut self, dto: InteractionDto) {
        self.occurred_at = Some(dto.occurred_at);
        self.ended_at = dto.ended_at;
        self.channel = dto.channel;
        self.summary = dto.summary;
        self.relations.set_key(rel::INSTANCE, dto.instance_id);
        self.relations.set_key(rel::PERSON, dto.person_id);
    }

    fn span(&self) -> Option<Span> {
        self.occurred_at.map(|start| Span::new(start, self.ended_at))
    }
}
