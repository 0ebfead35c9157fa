//! Root save-file reader: drives the registry through the fixed top-level
//! record sequence and hands back the fully decoded graph.

use tracing::debug;

use crate::codec::map::{Gallery, MapData, Room};
use crate::codec::objects::{Entity, Lift, ObjectData};
use crate::codec::registry::{Decoder, ObjRef, Record, Slot};
use crate::codec::script::Script;
use crate::codec::types::{ObjectType, Required, Version};
use crate::error::{Error, Result};

/// Saved camera/viewport bookmark.
#[derive(Debug, Clone, Default)]
pub struct FavouritePlace {
    pub name: String,
    pub x: u16,
    pub y: u16,
}

/// A fully decoded save-file image. Decoding runs to completion before any
/// of this is handed to materialization, so a failed load never leaves a
/// half-built world behind.
#[derive(Debug, Clone)]
pub struct SaveFile {
    pub version: Version,
    pub map: ObjRef,
    pub objects: Vec<ObjRef>,
    pub scenery: Vec<ObjRef>,
    pub scripts: Vec<Script>,
    pub scroll_x: u32,
    pub scroll_y: u32,
    pub favourite_place: FavouritePlace,
    pub speech_history: Vec<String>,
    pub macros: Vec<ObjRef>,
    pub(crate) slots: Vec<Slot>,
}

impl SaveFile {
    /// Decode one save-file image. `expected` is the version implied by the
    /// host's configured ruleset; a stream declaring anything else fails
    /// with [`Error::VersionMismatch`].
    pub fn read(data: &[u8], expected: Version) -> Result<SaveFile> {
        let mut d = Decoder::new(data, expected);

        let map = d.resolve_required(Required::Exact(ObjectType::MapData), "map record")?;
        let version = d.version()?;

        // Modern streams pad the map record with a version-dependent run of
        // zero bytes. Skip zeros, then step back one byte so the cursor
        // lands on the first real byte of the object count.
        if version.is_modern() {
            let mut b = d.reader.read_u8()?;
            while b == 0 {
                b = d.reader.read_u8()?;
            }
            let pos = d.reader.position();
            d.reader.set_position(pos - 1);
        }

        let object_count = d.reader.read_u32()?;
        let mut objects = Vec::with_capacity(object_count as usize);
        for _ in 0..object_count {
            objects.push(d.resolve_required(Required::Object, "world object")?);
        }

        let scenery_count = d.reader.read_u32()?;
        let mut scenery = Vec::with_capacity(scenery_count as usize);
        for _ in 0..scenery_count {
            scenery.push(d.resolve_required(Required::Exact(ObjectType::Scenery), "scenery")?);
        }

        let script_count = d.reader.read_u32()?;
        let mut scripts = Vec::with_capacity(script_count as usize);
        for _ in 0..script_count {
            scripts.push(Script::read(&mut d)?);
        }

        let scroll_x = d.reader.read_u32()?;
        let scroll_y = d.reader.read_u32()?;

        let zero = d.reader.read_u16()?;
        if zero != 0 {
            return Err(Error::MalformedRecord(format!(
                "non-zero field before favourite place: {zero:#06x}"
            )));
        }

        let favourite_place = FavouritePlace {
            name: d.reader.read_string()?,
            x: d.reader.read_u16()?,
            y: d.reader.read_u16()?,
        };

        let pad = match version {
            Version::Legacy => 25,
            Version::Modern => 29,
        };
        d.reader.skip(pad)?;

        let speech_count = d.reader.read_u16()?;
        let mut speech_history = Vec::with_capacity(speech_count as usize);
        for _ in 0..speech_count {
            speech_history.push(d.reader.read_string()?);
        }

        // Null macros belong to objects that no longer exist; they are
        // dropped, not stored.
        let macro_count = d.reader.read_u32()?;
        let mut macros = Vec::new();
        for _ in 0..macro_count {
            if let Some(m) = d.resolve(Required::Exact(ObjectType::Macro))? {
                macros.push(m);
            }
        }

        debug!(
            slots = d.slot_count(),
            objects = objects.len(),
            scenery = scenery.len(),
            scripts = scripts.len(),
            macros = macros.len(),
            "decoded save file"
        );

        Ok(SaveFile {
            version,
            map,
            objects,
            scenery,
            scripts,
            scroll_x,
            scroll_y,
            favourite_place,
            speech_history,
            macros,
            slots: d.into_slots(),
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_tags(&self) -> impl Iterator<Item = ObjectType> + '_ {
        self.slots.iter().map(|s| s.tag())
    }

    pub fn record(&self, r: ObjRef) -> Result<&Record> {
        match self.slots.get(r.index()) {
            Some(Slot::Ready(_, record)) => Ok(record),
            _ => Err(Error::MalformedRecord(format!(
                "slot {} was never fully decoded",
                r.index()
            ))),
        }
    }

    pub fn map_data(&self) -> Result<&MapData> {
        match self.record(self.map)? {
            Record::MapData(m) => Ok(m),
            _ => Err(self.kind_error(self.map, ObjectType::MapData)),
        }
    }

    pub fn gallery(&self, r: ObjRef) -> Result<&Gallery> {
        match self.record(r)? {
            Record::Gallery(g) => Ok(g),
            _ => Err(self.kind_error(r, ObjectType::Gallery)),
        }
    }

    pub fn room(&self, r: ObjRef) -> Result<&Room> {
        match self.record(r)? {
            Record::Room(room) => Ok(room),
            _ => Err(self.kind_error(r, ObjectType::Room)),
        }
    }

    pub fn entity(&self, r: ObjRef) -> Result<&Entity> {
        match self.record(r)? {
            Record::Entity(e) => Ok(e),
            _ => Err(self.kind_error(r, ObjectType::Entity)),
        }
    }

    pub fn lift(&self, r: ObjRef) -> Result<&Lift> {
        match self.record(r)? {
            Record::Lift(l) => Ok(l),
            _ => Err(self.kind_error(r, ObjectType::Lift)),
        }
    }

    /// The shared object base of any agent-like record.
    pub fn object_data(&self, r: ObjRef) -> Result<&ObjectData> {
        match self.record(r)? {
            Record::CompoundObject(o) => Ok(&o.base),
            Record::Blackboard(o) => Ok(&o.compound.base),
            Record::Vehicle(o) => Ok(&o.compound.base),
            Record::Lift(o) => Ok(&o.vehicle.compound.base),
            Record::SimpleObject(o) => Ok(&o.base),
            Record::PointerTool(o) => Ok(&o.simple.base),
            Record::CallButton(o) => Ok(&o.simple.base),
            Record::Scenery(o) => Ok(&o.base),
            _ => Err(Error::TypeMismatch {
                actual: self.slots[r.index()].tag(),
                required: Required::Object,
            }),
        }
    }

    fn kind_error(&self, r: ObjRef, wanted: ObjectType) -> Error {
        Error::TypeMismatch {
            actual: self.slots[r.index()].tag(),
            required: Required::Exact(wanted),
        }
    }
}
