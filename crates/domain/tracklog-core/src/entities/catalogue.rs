use serde::{Deserialize, Serialize};

use super::require_text;
use crate::{
    EntityKind, Incomplete, LocalId, PayloadBuild, RecordMeta, Relations, RemoteDto, SyncRecord,
};

/// Catalogue entry for people referenced by interactions and agenda entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub meta: RecordMeta,
    #[serde(default)]
    pub relations: Relations,
    pub name: String,
    pub email: Option<String>,
    pub archived: bool,
}

impl Person {
    pub fn draft(name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            relations: Relations::new(),
            name: name.into(),
            email: None,
            archived: false,
        }
    }

    fn try_payload(&self) -> Result<PersonPayload, Incomplete> {
        Ok(PersonPayload {
            name: require_text("name", &self.name)?,
            email: self.email.clone(),
            archived: self.archived,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDto {
    pub id: LocalId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl RemoteDto for PersonDto {
    fn id(&self) -> LocalId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonPayload {
    pub name: String,
    pub email: Option<String>,
    pub archived: bool,
}

impl SyncRecord for Person {
    type Dto = PersonDto;
    type Payload = PersonPayload;

    const KIND: EntityKind = EntityKind::Person;
    const ARCHIVABLE: bool = true;

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
        self.name.clone()
    }

    fn payload(&self) -> PayloadBuild<PersonPayload> {
        self.try_payload().into()
    }

    fn from_dto(dto: PersonDto) -> Self {
        Self {
            meta: RecordMeta::synced(dto.id),
            relations: Relations::new(),
            name: dto.name,
            email: dto.email,
            archived: dto.archived,
        }
    }

    fn update_from(&mut self, dto: PersonDto) {
        self.name = dto.name;
        self.email = dto.email;
        self.archived = dto.archived;
    }

    fn is_archived(&self) -> bool {
        self.archived
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub meta: RecordMeta,
    #[serde(default)]
    pub relations: Relations,
    pub name: String,
    pub plate: Option<String>,
    pub archived: bool,
}

impl Vehicle {
    pub fn draft(name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            relations: Relations::new(),
            name: name.into(),
            plate: None,
            archived: false,
        }
    }

    fn try_payload(&self) -> Result<VehiclePayload, Incomplete> {
        Ok(VehiclePayload {
            name: require_text("name", &self.name)?,
            plate: self.plate.clone(),
            archived: self.archived,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDto {
    pub id: LocalId,
    pub name: String,
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

impl RemoteDto for VehicleDto {
    fn id(&self) -> LocalId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehiclePayload {
    pub name: String,
    pub plate: Option<String>,
    pub archived: bool,
}

impl SyncRecord for Vehicle {
    type Dto = VehicleDto;
    type Payload = VehiclePayload;

    const KIND: EntityKind = EntityKind::Vehicle;
    const ARCHIVABLE: bool = true;

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
        match &self.plate {
            Some(plate) => format!("{} ({plate})", self.name),
            None => self.name.clone(),
        }
    }

    fn payload(&self) -> PayloadBuild<VehiclePayload> {
        self.try_payload().into()
    }

    fn from_dto(dto: VehicleDto) -> Self {
        Self {
            meta: RecordMeta::synced(dto.id),
            relations: Relations::new(),
            name: dto.name,
            plate: dto.plate,
            archived: dto.archived,
        }
    }

    fn update_from(&mut self, dto: VehicleDto) {
        self.name = dto.name;
        self.plate = dto.plate;
        self.archived = dto.archived;
    }

    fn is_archived(&self) -> bool {
        self.archived
    }
}
