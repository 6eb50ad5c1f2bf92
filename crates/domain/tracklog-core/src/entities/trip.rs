use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{rel, require};
use crate::{
    EntityKind, Incomplete, LocalId, PayloadBuild, RecordMeta, RelationSpec, Relations,
    RemoteDto, Span, SpanColumns, SyncRecord,
};

const RELATIONS: &[RelationSpec] = &[
    RelationSpec::required(rel::INSTANCE, EntityKind::Activity),
    RelationSpec::optional(rel::VEHICLE, EntityKind::Vehicle),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub meta: RecordMeta,
    #[serde(default)]
    pub relations: Relations,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub distance_km: Option<f64>,
}

impl Trip {
    pub fn draft(instance: LocalId, started_at: Option<DateTime<Utc>>) -> Self {
        Self {
            meta: RecordMeta::default(),
            relations: Relations::new().with_key(rel::INSTANCE, Some(instance)),
            started_at,
            ended_at: None,
            origin: None,
            destination: None,
            distance_km: None,
        }
    }

    pub fn instance(&self) -> Option<LocalId> {
        self.relations.key(rel::INSTANCE)
    }

    pub fn vehicle(&self) -> Option<LocalId> {
        self.relations.key(rel::VEHICLE)
    }

    fn try_payload(&self) -> Result<TripPayload, Incomplete> {
        Ok(TripPayload {
            instance_id: require(rel::INSTANCE, self.relations.outbound_key(&RELATIONS[0])?)?,
            vehicle_id: self.relations.outbound_key(&RELATIONS[1])?,
            started_at: require("started_at", self.started_at)?,
            ended_at: self.ended_at,
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            distance_km: self.distance_km,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripDto {
    pub id: LocalId,
    #[serde(default)]
    pub instance_id: Option<LocalId>,
    #[serde(default)]
    pub vehicle_id: Option<LocalId>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub distance_km: Option<f64>,
}

impl RemoteDto for TripDto {
    fn id(&self) -> LocalId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripPayload {
    pub instance_id: LocalId,
    pub vehicle_id: Option<LocalId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub distance_km: Option<f64>,
}

impl SyncRecord for Trip {
    type Dto = TripDto;
    type Payload = TripPayload;

    const KIND: EntityKind = EntityKind::Trip;
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
        match (&self.origin, &self.destination) {
            (Some(from), Some(to)) => format!("{from} → {to}"),
            (Some(place), None) | (None, Some(place)) => place.clone(),
            (None, None) => "Trip".to_string(),
        }
    }

    fn payload(&self) -> PayloadBuild<TripPayload> {
        self.try_payload().into()
    }

    fn from_dto(dto: TripDto) -> Self {
        let mut record = Self {
            meta: RecordMeta::synced(dto.id),
            relations: Relations::new(),
            started_at: None,
            ended_at: None,
            origin: None,
            destination: None,
            distance_km: None,
        };
        record.update_from(dto);
        record
    }

    fn update_from(&mut self, dto: TripDto) {
        self.started_at = Some(dto.started_at);
        self.ended_at = dto.ended_at;
        self.origin = dto.origin;
        self.destination = dto.destination;
        self.distance_km = dto.distance_km;
        self.relations.set_key(rel::INSTANCE, dto.instance_id);
        self.relations.set_key(rel::VEHICLE, dto.vehicle_id);
    }

    fn span(&self) -> Option<Span> {
        self.started_at.map(|start| Span::new(start, self.ended_at))
    }
}
