//! Map-level records: the root map, sprite galleries, rooms and doors.

use crate::codec::reader::latin1;
use crate::codec::registry::{Decoder, ObjRef};
use crate::codec::types::{ObjectType, Required, Version};
use crate::error::{Error, Result};

/// Number of entries in the legacy ground-level table.
pub const GROUND_LEVEL_COUNT: usize = 261;

/// Root record. Also the place where the stream declares its format
/// version, which the decoder pins for the rest of the session.
#[derive(Debug, Clone)]
pub struct MapData {
    pub background: ObjRef,
    pub rooms: Vec<MapRoom>,
    /// Legacy only; empty on modern streams.
    pub ground_levels: Vec<u32>,
}

/// Legacy streams store rooms inline inside the map record; modern streams
/// store them as registry objects.
#[derive(Debug, Clone)]
pub enum MapRoom {
    Inline(Room),
    Slot(ObjRef),
}

impl MapData {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let raw = d.reader.read_u32()?;
        d.set_version(raw)?;
        let version = d.version()?;

        d.reader.read_u32()?;
        if version.is_modern() {
            d.reader.read_u32()?;
            d.reader.read_u32()?;
        }

        let background =
            d.resolve_required(Required::Exact(ObjectType::Gallery), "background gallery")?;

        let count = d.reader.read_u32()? as u64;
        let mut rooms = Vec::new();
        match version {
            Version::Legacy => {
                for id in 0..count {
                    let left = d.reader.read_i32()?;
                    let top = d.reader.read_u32()? as i32;
                    let right = d.reader.read_i32()?;
                    let bottom = d.reader.read_u32()? as i32;
                    let room_type = d.reader.read_u32()?;
                    if room_type >= 3 {
                        return Err(Error::MalformedRecord(format!(
                            "room type {room_type} out of range"
                        )));
                    }
                    rooms.push(MapRoom::Inline(Room {
                        id: id as u32,
                        left,
                        top,
                        right,
                        bottom,
                        room_type,
                        ..Room::default()
                    }));
                }
            }
            Version::Modern => {
                // A null reference is a deleted room; it extends the scan by
                // one entry instead of being stored.
                let mut total = count;
                let mut i = 0;
                while i < total {
                    match d.resolve(Required::Exact(ObjectType::Room))? {
                        Some(room) => rooms.push(MapRoom::Slot(room)),
                        None => total += 1,
                    }
                    i += 1;
                }
            }
        }

        let mut ground_levels = Vec::new();
        if version == Version::Legacy {
            ground_levels.reserve(GROUND_LEVEL_COUNT);
            for _ in 0..GROUND_LEVEL_COUNT {
                ground_levels.push(d.reader.read_u32()?);
            }
            d.reader.skip(800)?;
        }

        Ok(MapData {
            background,
            rooms,
            ground_levels,
        })
    }
}

/// Sprite-sheet metadata. Per-frame geometry is carried in the stream but
/// not needed once the sheet is reloaded from disk, so it is skipped.
#[derive(Debug, Clone)]
pub struct Gallery {
    pub frame_count: u32,
    /// Four-character sprite-file token.
    pub filename: String,
    pub first_image: u32,
}

impl Gallery {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let frame_count = d.reader.read_u32()?;
        let filename = latin1(d.reader.read_bytes(4)?);
        let first_image = d.reader.read_u32()?;
        d.reader.read_u32()?;

        for _ in 0..frame_count {
            d.reader.skip(3)?;
            d.reader.skip(12)?;
        }

        Ok(Gallery {
            frame_count,
            filename,
            first_image,
        })
    }
}

/// One side of a permeability link between two rooms.
#[derive(Debug, Clone)]
pub struct Door {
    pub openness: u8,
    pub other_room: u16,
}

impl Door {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let openness = d.reader.read_u8()?;
        let other_room = d.reader.read_u16()?;
        let zero = d.reader.read_u16()?;
        if zero != 0 {
            return Err(Error::MalformedRecord(format!(
                "non-zero door trailer {zero:#06x}"
            )));
        }
        Ok(Door {
            openness,
            other_room,
        })
    }
}

/// Room edges carrying door lists, in stream order.
pub const ROOM_EDGES: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct Room {
    pub id: u32,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub doors: [Vec<ObjRef>; ROOM_EDGES],
    pub room_type: u32,
    pub floor_value: u8,
    pub inorganic_nutrients: u8,
    pub organic_nutrients: u8,
    pub temperature: u8,
    pub heat_source: i32,
    pub pressure: u8,
    pub pressure_source: i32,
    pub wind_x: i32,
    pub wind_y: i32,
    pub light_level: u8,
    pub light_source: i32,
    pub radiation: u8,
    pub radiation_source: i32,
    pub floor_points: Vec<(u32, u32)>,
    pub music: String,
    pub drop_status: u32,
}

impl Room {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let id = d.reader.read_u32()?;

        let magic = d.reader.read_u16()?;
        if magic != 2 {
            return Err(Error::MalformedRecord(format!(
                "room {id}: bad magic {magic}"
            )));
        }

        let left = d.reader.read_u32()? as i32;
        let top = d.reader.read_u32()? as i32;
        let right = d.reader.read_u32()? as i32;
        let bottom = d.reader.read_u32()? as i32;

        let mut doors: [Vec<ObjRef>; ROOM_EDGES] = Default::default();
        for edge in doors.iter_mut() {
            let count = d.reader.read_u16()?;
            for _ in 0..count {
                edge.push(d.resolve_required(Required::Exact(ObjectType::Door), "room door")?);
            }
        }

        let room_type = d.reader.read_u32()?;
        if room_type >= 4 {
            return Err(Error::MalformedRecord(format!(
                "room {id}: room type {room_type} out of range"
            )));
        }

        let floor_value = d.reader.read_u8()?;
        let inorganic_nutrients = d.reader.read_u8()?;
        let organic_nutrients = d.reader.read_u8()?;
        let temperature = d.reader.read_u8()?;
        let heat_source = d.reader.read_i32()?;
        let pressure = d.reader.read_u8()?;
        let pressure_source = d.reader.read_i32()?;
        let wind_x = d.reader.read_i32()?;
        let wind_y = d.reader.read_i32()?;
        let light_level = d.reader.read_u8()?;
        let light_source = d.reader.read_i32()?;
        let radiation = d.reader.read_u8()?;
        let radiation_source = d.reader.read_i32()?;

        d.reader.skip(800)?;

        let point_count = d.reader.read_u16()?;
        let mut floor_points = Vec::with_capacity(point_count as usize);
        for _ in 0..point_count {
            let x = d.reader.read_u32()?;
            let y = d.reader.read_u32()?;
            floor_points.push((x, y));
        }

        let zero = d.reader.read_u32()?;
        if zero != 0 {
            return Err(Error::MalformedRecord(format!(
                "room {id}: non-zero trailer before music"
            )));
        }

        let music = d.reader.read_string()?;
        let drop_status = d.reader.read_u32()?;
        if drop_status >= 3 {
            return Err(Error::MalformedRecord(format!(
                "room {id}: drop status {drop_status} out of range"
            )));
        }

        Ok(Room {
            id,
            left,
            top,
            right,
            bottom,
            doors,
            room_type,
            floor_value,
            inorganic_nutrients,
            organic_nutrients,
            temperature,
            heat_source,
            pressure,
            pressure_source,
            wind_x,
            wind_y,
            light_level,
            light_source,
            radiation,
            radiation_source,
            floor_points,
            music,
            drop_status,
        })
    }
}
