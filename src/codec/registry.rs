//! Object registry: the slot arena and the reference-resolution protocol.
//!
//! Every embedded reference in the stream goes through [`Decoder::resolve`].
//! A 16-bit persistent id multiplexes four cases: null, back-reference,
//! new instance of a declared class, and first-time class declaration.
//! Slots are appended in declaration order and addressed by index, so
//! reference identity is index equality.

use crate::codec::map::{Door, Gallery, MapData, Room};
use crate::codec::objects::{
    Blackboard, CallButton, CompoundObject, Entity, Lift, PointerTool, Scenery, SimpleObject,
    Vehicle,
};
use crate::codec::reader::{latin1, BinaryReader};
use crate::codec::script::Macro;
use crate::codec::types::{accepts, ObjectType, Required, Version};
use crate::error::{Error, Result};

/// Handle to one registry slot. Two equal handles denote the same decoded
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub(crate) usize);

impl ObjRef {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One decoded record payload.
#[derive(Debug, Clone)]
pub enum Record {
    MapData(MapData),
    Gallery(Gallery),
    Door(Door),
    Room(Room),
    Entity(Entity),
    CompoundObject(CompoundObject),
    Blackboard(Blackboard),
    Vehicle(Vehicle),
    Lift(Lift),
    SimpleObject(SimpleObject),
    PointerTool(PointerTool),
    CallButton(CallButton),
    Scenery(Scenery),
    Macro(Macro),
}

/// Registry slot life cycle. A slot exists from the moment its class is
/// declared; the payload arrives only once the instance body has been
/// decoded. `InProgress` marks an instance whose body is still being read,
/// which is what lets self-referential graphs resolve mid-decode.
#[derive(Debug, Clone)]
pub enum Slot {
    Declared(ObjectType),
    InProgress(ObjectType),
    Ready(ObjectType, Record),
}

impl Slot {
    pub fn tag(&self) -> ObjectType {
        match self {
            Slot::Declared(t) | Slot::InProgress(t) | Slot::Ready(t, _) => *t,
        }
    }
}

/// Decode context: the byte cursor, the slot arena, and the session
/// version. Version is discovered from the root map record and immutable
/// afterwards.
pub struct Decoder<'a> {
    pub(crate) reader: BinaryReader<'a>,
    slots: Vec<Slot>,
    version: Option<Version>,
    expected: Version,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8], expected: Version) -> Self {
        Self {
            reader: BinaryReader::new(data),
            slots: Vec::new(),
            version: None,
            expected,
        }
    }

    pub fn version(&self) -> Result<Version> {
        self.version
            .ok_or_else(|| Error::MalformedRecord("format version not yet declared".into()))
    }

    /// Record the version declared by the root map record and cross-check
    /// it against the caller's configured ruleset.
    pub(crate) fn set_version(&mut self, raw: u32) -> Result<()> {
        let found = Version::from_raw(raw)
            .ok_or_else(|| Error::MalformedRecord(format!("unknown version number {raw}")))?;
        if found != self.expected {
            return Err(Error::VersionMismatch {
                found,
                expected: self.expected,
            });
        }
        self.version = Some(found);
        Ok(())
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn force_version(&mut self, version: Version) {
        self.version = Some(version);
    }

    pub(crate) fn into_slots(self) -> Vec<Slot> {
        self.slots
    }

    /// Resolve one reference. Returns `None` for a null persistent id,
    /// which several reference sites treat as a legitimate "object gone"
    /// outcome.
    pub fn resolve(&mut self, required: Required) -> Result<Option<ObjRef>> {
        let pid = self.reader.read_u16()?;

        if pid == 0 {
            return Ok(None);
        }

        if pid == 0xffff {
            // First encounter of a class: schema id (reserved, unused),
            // then the class name with a plain u16 length prefix.
            let _schema = self.reader.read_u16()?;
            let len = self.reader.read_u16()? as usize;
            let name = latin1(self.reader.read_bytes(len)?);
            let tag = ObjectType::from_class_name(&name)?;
            self.slots.push(Slot::Declared(tag));
            let index = self.slots.len() - 1;
            return self.instantiate(index, required).map(Some);
        }

        if pid & 0x8000 != 0 {
            // New instance of a class declared earlier. Slot numbers are
            // one-based, so the top-bit form with a zero payload encodes
            // no slot at all.
            let index = match (pid ^ 0x8000).checked_sub(1) {
                Some(index) => index as usize,
                None => {
                    return Err(Error::MalformedRecord(
                        "instance reference with zero slot number".into(),
                    ))
                }
            };
            return self.instantiate(index, required).map(Some);
        }

        // Back-reference to an already-instantiated slot.
        let index = (pid - 1) as usize;
        match self.slots.get(index) {
            None => Err(Error::MalformedRecord(format!(
                "back-reference to undeclared slot {index}"
            ))),
            Some(Slot::Declared(_)) => Err(Error::MalformedRecord(format!(
                "back-reference to uninstantiated slot {index}"
            ))),
            Some(Slot::InProgress(tag)) | Some(Slot::Ready(tag, _)) => {
                let tag = *tag;
                if !accepts(tag, required) {
                    return Err(Error::TypeMismatch {
                        actual: tag,
                        required,
                    });
                }
                Ok(Some(ObjRef(index)))
            }
        }
    }

    /// Resolve a reference that the format documents as mandatory.
    pub fn resolve_required(&mut self, required: Required, what: &'static str) -> Result<ObjRef> {
        self.resolve(required)?
            .ok_or(Error::MissingRequiredReference(what))
    }

    /// Fill a declared slot with a freshly decoded instance. The slot is
    /// marked occupied before its body is read so that references back to
    /// it resolve while decoding is still under way.
    fn instantiate(&mut self, index: usize, required: Required) -> Result<ObjRef> {
        let tag = match self.slots.get(index) {
            None => {
                return Err(Error::MalformedRecord(format!(
                    "instance reference to undeclared slot {index}"
                )))
            }
            Some(Slot::Declared(tag)) => *tag,
            Some(Slot::InProgress(_)) | Some(Slot::Ready(_, _)) => {
                return Err(Error::DuplicateInstance { slot: index })
            }
        };

        if !accepts(tag, required) {
            return Err(Error::TypeMismatch {
                actual: tag,
                required,
            });
        }

        self.slots[index] = Slot::InProgress(tag);
        let record = self.decode_record(tag)?;
        self.slots[index] = Slot::Ready(tag, record);
        Ok(ObjRef(index))
    }

    fn decode_record(&mut self, tag: ObjectType) -> Result<Record> {
        Ok(match tag {
            ObjectType::MapData => Record::MapData(MapData::read(self)?),
            ObjectType::Gallery => Record::Gallery(Gallery::read(self)?),
            ObjectType::Door => Record::Door(Door::read(self)?),
            ObjectType::Room => Record::Room(Room::read(self)?),
            ObjectType::Entity => Record::Entity(Entity::read(self)?),
            ObjectType::CompoundObject => Record::CompoundObject(CompoundObject::read(self)?),
            ObjectType::Blackboard => Record::Blackboard(Blackboard::read(self)?),
            ObjectType::Vehicle => Record::Vehicle(Vehicle::read(self)?),
            ObjectType::Lift => Record::Lift(Lift::read(self)?),
            ObjectType::SimpleObject => Record::SimpleObject(SimpleObject::read(self)?),
            ObjectType::PointerTool => Record::PointerTool(PointerTool::read(self)?),
            ObjectType::CallButton => Record::CallButton(CallButton::read(self)?),
            ObjectType::Scenery => Record::Scenery(Scenery::read(self)?),
            ObjectType::Macro => Record::Macro(Macro::read(self)?),
        })
    }
}
