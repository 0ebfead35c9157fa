//! Agent-object records: the shared object base, visual entities, and the
//! compound/simple object trees.
//!
//! Composite kinds decode their base portion first, mirroring the subtype
//! relation used by the reference protocol: the object base comes before
//! compound/simple fields, compound before blackboard/vehicle, vehicle
//! before lift.

use crate::codec::reader::{c_string, latin1};
use crate::codec::registry::{Decoder, ObjRef};
use crate::codec::script::Script;
use crate::codec::types::{ObjectType, Required, Version};
use crate::error::{Error, Result};

/// Number of hotspot rectangles on every compound object.
pub const HOTSPOT_COUNT: usize = 6;

/// Number of call-button y-offset slots carried by every lift.
pub const LIFT_BUTTON_SLOTS: usize = 8;

/// One visual part: a sprite reference plus frame and position state.
#[derive(Debug, Clone)]
pub struct Entity {
    pub sprite: ObjRef,
    pub current_frame: u8,
    pub image_offset: u8,
    pub z_order: i32,
    pub x: u32,
    pub y: u32,
    pub animation: Option<Animation>,
}

#[derive(Debug, Clone)]
pub struct Animation {
    pub frame: u8,
    pub descriptor: String,
}

impl Entity {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let sprite = d.resolve_required(Required::Exact(ObjectType::Gallery), "entity sprite")?;

        let current_frame = d.reader.read_u8()?;
        let image_offset = d.reader.read_u8()?;
        let z_order = d.reader.read_i32()?;
        let x = d.reader.read_u32()?;
        let y = d.reader.read_u32()?;

        let anim_flag = d.reader.read_u8()?;
        let animation = match anim_flag {
            0 => None,
            1 => {
                let frame = d.reader.read_u8()?;
                let len = if d.version()?.is_modern() { 99 } else { 32 };
                let descriptor = c_string(d.reader.read_bytes(len)?);
                Some(Animation { frame, descriptor })
            }
            other => {
                return Err(Error::MalformedRecord(format!(
                    "bad animation flag {other}"
                )))
            }
        };

        Ok(Entity {
            sprite,
            current_frame,
            image_offset,
            z_order,
            x,
            y,
            animation,
        })
    }
}

/// Modern-only physical simulation attributes.
#[derive(Debug, Clone)]
pub struct Physics {
    pub size: u8,
    pub range: u32,
    /// 0xFFFFFFFF means the object is not falling; anything else means it is.
    pub gravity_data: u32,
    pub acceleration: u32,
    pub velocity_x: i32,
    pub velocity_y: i32,
    pub restitution: u32,
    pub aerodynamics: u32,
    pub threat: u8,
    pub frozen: bool,
}

impl Physics {
    pub fn falling(&self) -> bool {
        self.gravity_data != 0xffff_ffff
    }
}

/// Fields shared by every agent-like object kind.
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub family: u8,
    pub genus: u8,
    pub species: u16,
    /// Persisted world-unique id; zero on legacy streams.
    pub unid: u32,
    pub attributes: u16,
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub activation: u8,
    pub sprite: ObjRef,
    pub tick_reset: u32,
    pub tick_state: u32,
    /// Four-character looping-sound token, if one was playing.
    pub current_sound: Option<String>,
    pub variables: Vec<u32>,
    pub physics: Option<Physics>,
    pub scripts: Vec<Script>,
}

impl ObjectData {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let version = d.version()?;

        let (family, genus, species);
        match version {
            Version::Legacy => {
                d.reader.read_u8()?; // unused classifier byte
                species = d.reader.read_u8()? as u16;
                genus = d.reader.read_u8()?;
                family = d.reader.read_u8()?;
            }
            Version::Modern => {
                genus = d.reader.read_u8()?;
                family = d.reader.read_u8()?;
                check_zero16(d, "classifier pad")?;
                species = d.reader.read_u16()?;
            }
        }

        let unid = match version {
            Version::Legacy => {
                d.reader.read_u8()?;
                0
            }
            Version::Modern => {
                let unid = d.reader.read_u32()?;
                d.reader.read_u8()?;
                unid
            }
        };

        let attributes = match version {
            Version::Legacy => d.reader.read_u8()? as u16,
            Version::Modern => d.reader.read_u16()?,
        };
        if version.is_modern() {
            check_zero16(d, "attribute pad")?;
        }

        let left = d.reader.read_u32()?;
        let top = d.reader.read_u32()?;
        let right = d.reader.read_u32()?;
        let bottom = d.reader.read_u32()?;

        d.reader.read_u16()?;

        let activation = d.reader.read_u8()?;

        let sprite = d.resolve_required(Required::Exact(ObjectType::Gallery), "object sprite")?;

        let tick_reset = d.reader.read_u32()?;
        let tick_state = d.reader.read_u32()?;
        if tick_state > tick_reset {
            return Err(Error::MalformedRecord(format!(
                "tick state {tick_state} exceeds tick reset {tick_reset}"
            )));
        }

        check_zero16(d, "tick pad")?;

        let sound = d.reader.read_bytes(4)?;
        let current_sound = if sound[0] == 0 {
            None
        } else {
            Some(latin1(sound))
        };

        let mut variables = Vec::with_capacity(version.variable_count());
        for _ in 0..version.variable_count() {
            variables.push(d.reader.read_u32()?);
        }

        let physics = if version.is_modern() {
            let size = d.reader.read_u8()?;
            let range = d.reader.read_u32()?;
            let gravity_data = d.reader.read_u32()?;
            let acceleration = d.reader.read_u32()?;
            let velocity_x = d.reader.read_i32()?;
            let velocity_y = d.reader.read_i32()?;
            let restitution = d.reader.read_u32()?;
            let aerodynamics = d.reader.read_u32()?;
            d.reader.skip(6)?;
            let threat = d.reader.read_u8()?;
            let flags = d.reader.read_u8()?;
            Some(Physics {
                size,
                range,
                gravity_data,
                acceleration,
                velocity_x,
                velocity_y,
                restitution,
                aerodynamics,
                threat,
                frozen: flags & 0x02 != 0,
            })
        } else {
            None
        };

        let script_count = d.reader.read_u32()?;
        let mut scripts = Vec::with_capacity(script_count as usize);
        for _ in 0..script_count {
            scripts.push(Script::read(d)?);
        }

        Ok(ObjectData {
            family,
            genus,
            species,
            unid,
            attributes,
            left,
            top,
            right,
            bottom,
            activation,
            sprite,
            tick_reset,
            tick_state,
            current_sound,
            variables,
            physics,
            scripts,
        })
    }
}

/// A hotspot rectangle and its trigger function mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hotspot {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub function: i32,
    /// Modern only.
    pub message: u16,
    /// Modern only.
    pub mask: u8,
}

#[derive(Debug, Clone)]
pub struct CompoundPart {
    /// Null for parts whose entity record was deleted; never null for the
    /// first part.
    pub entity: Option<ObjRef>,
    pub rel_x: u32,
    pub rel_y: u32,
}

#[derive(Debug, Clone)]
pub struct CompoundObject {
    pub base: ObjectData,
    pub parts: Vec<CompoundPart>,
    pub hotspots: [Hotspot; HOTSPOT_COUNT],
}

impl CompoundObject {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let base = ObjectData::read(d)?;

        let part_count = d.reader.read_u32()?;
        let mut parts = Vec::with_capacity(part_count as usize);
        for i in 0..part_count {
            let entity = d.resolve(Required::Exact(ObjectType::Entity))?;
            let rel_x = d.reader.read_u32()?;
            let rel_y = d.reader.read_u32()?;
            if i == 0 {
                if entity.is_none() {
                    return Err(Error::MissingRequiredReference("first compound part"));
                }
                if rel_x != 0 || rel_y != 0 {
                    return Err(Error::MalformedRecord(format!(
                        "first compound part has offset ({rel_x}, {rel_y})"
                    )));
                }
            }
            parts.push(CompoundPart {
                entity,
                rel_x,
                rel_y,
            });
        }

        let mut hotspots = [Hotspot::default(); HOTSPOT_COUNT];
        for hotspot in hotspots.iter_mut() {
            hotspot.left = d.reader.read_i32()?;
            hotspot.top = d.reader.read_i32()?;
            hotspot.right = d.reader.read_i32()?;
            hotspot.bottom = d.reader.read_i32()?;
        }
        for hotspot in hotspots.iter_mut() {
            hotspot.function = d.reader.read_i32()?;
        }

        if d.version()?.is_modern() {
            for hotspot in hotspots.iter_mut() {
                hotspot.message = d.reader.read_u16()?;
                check_zero16(d, "hotspot message pad")?;
            }
            for hotspot in hotspots.iter_mut() {
                hotspot.mask = d.reader.read_u8()?;
            }
        }

        Ok(CompoundObject {
            base,
            parts,
            hotspots,
        })
    }

    /// The part whose sprite and position identify the whole compound.
    pub fn first_part(&self) -> Result<ObjRef> {
        self.parts
            .first()
            .and_then(|p| p.entity)
            .ok_or(Error::MissingRequiredReference("first compound part"))
    }
}

#[derive(Debug, Clone)]
pub struct Blackboard {
    pub compound: CompoundObject,
    pub background_colour: u32,
    pub chalk_colour: u32,
    pub alias_colour: u32,
    pub text_x: u8,
    pub text_y: u8,
    pub words: Vec<(u32, String)>,
}

impl Blackboard {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let compound = CompoundObject::read(d)?;
        let version = d.version()?;

        let (background_colour, chalk_colour, alias_colour);
        match version {
            Version::Legacy => {
                background_colour = d.reader.read_u8()? as u32;
                chalk_colour = d.reader.read_u8()? as u32;
                alias_colour = d.reader.read_u8()? as u32;
            }
            Version::Modern => {
                background_colour = d.reader.read_u32()?;
                chalk_colour = d.reader.read_u32()?;
                alias_colour = d.reader.read_u32()?;
            }
        }
        let text_x = d.reader.read_u8()?;
        let text_y = d.reader.read_u8()?;

        let word_count = match version {
            Version::Legacy => 16,
            Version::Modern => 48,
        };
        let mut words = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            let value = d.reader.read_u32()?;
            let label = c_string(d.reader.read_bytes(11)?);
            words.push((value, label));
        }

        Ok(Blackboard {
            compound,
            background_colour,
            chalk_colour,
            alias_colour,
            text_x,
            text_y,
            words,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub compound: CompoundObject,
    pub velocity_x: i32,
    pub velocity_y: i32,
    pub cabin_left: u32,
    pub cabin_top: u32,
    pub cabin_right: u32,
    pub cabin_bottom: u32,
    pub bump: u32,
}

impl Vehicle {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let compound = CompoundObject::read(d)?;

        let velocity_x = d.reader.read_i32()?;
        let velocity_y = d.reader.read_i32()?;
        // Fixed-point coordinates, unused once the parts carry positions.
        d.reader.read_u32()?;
        d.reader.read_u32()?;

        let cabin_left = d.reader.read_u32()?;
        let cabin_top = d.reader.read_u32()?;
        let cabin_right = d.reader.read_u32()?;
        let cabin_bottom = d.reader.read_u32()?;

        let bump = d.reader.read_u32()?;

        Ok(Vehicle {
            compound,
            velocity_x,
            velocity_y,
            cabin_left,
            cabin_top,
            cabin_right,
            cabin_bottom,
            bump,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Lift {
    pub vehicle: Vehicle,
    pub button_count: u32,
    pub current_button: u32,
    pub button_y: [u32; LIFT_BUTTON_SLOTS],
    /// Modern only.
    pub align_with_cabin: bool,
}

impl Lift {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let vehicle = Vehicle::read(d)?;

        let button_count = d.reader.read_u32()?;
        let current_button = d.reader.read_u32()?;
        if button_count as usize > LIFT_BUTTON_SLOTS {
            return Err(Error::MalformedRecord(format!(
                "lift button count {button_count} exceeds {LIFT_BUTTON_SLOTS}"
            )));
        }

        let marker = d.reader.read_bytes(5)?;
        if marker != [0xff, 0xff, 0xff, 0xff, 0x00] {
            return Err(Error::MalformedRecord("bad lift marker".into()));
        }

        let mut button_y = [0u32; LIFT_BUTTON_SLOTS];
        for y in button_y.iter_mut() {
            *y = d.reader.read_u32()?;
            check_zero16(d, "lift button pad")?;
        }

        let align_with_cabin = if d.version()?.is_modern() {
            d.reader.read_u32()? != 0
        } else {
            false
        };

        Ok(Lift {
            vehicle,
            button_count,
            current_button,
            button_y,
            align_with_cabin,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SimpleObject {
    pub base: ObjectData,
    pub entity: ObjRef,
    pub part_z_order: u32,
    pub click_behaviour: [i8; 3],
    pub touch_behaviour: u8,
    /// Modern only.
    pub pickup_handles: Vec<(i32, i32)>,
    /// Modern only.
    pub pickup_points: Vec<(i32, i32)>,
}

impl SimpleObject {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let base = ObjectData::read(d)?;

        let entity = match d.resolve(Required::Exact(ObjectType::Entity))? {
            Some(entity) => entity,
            None => return Err(Error::MissingRequiredReference("simple object entity")),
        };

        let part_z_order = d.reader.read_u32()?;
        let click_behaviour = [
            d.reader.read_i8()?,
            d.reader.read_i8()?,
            d.reader.read_i8()?,
        ];
        let touch_behaviour = d.reader.read_u8()?;

        let mut pickup_handles = Vec::new();
        let mut pickup_points = Vec::new();
        if d.version()?.is_modern() {
            let handle_count = d.reader.read_u16()?;
            for _ in 0..handle_count {
                let x = d.reader.read_i32()?;
                let y = d.reader.read_i32()?;
                pickup_handles.push((x, y));
            }
            let point_count = d.reader.read_u16()?;
            for _ in 0..point_count {
                let x = d.reader.read_i32()?;
                let y = d.reader.read_i32()?;
                pickup_points.push((x, y));
            }
        }

        Ok(SimpleObject {
            base,
            entity,
            part_z_order,
            click_behaviour,
            touch_behaviour,
            pickup_handles,
            pickup_points,
        })
    }
}

#[derive(Debug, Clone)]
pub struct PointerTool {
    pub simple: SimpleObject,
}

impl PointerTool {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let simple = SimpleObject::read(d)?;
        let skip = if d.version()?.is_modern() { 51 } else { 35 };
        d.reader.skip(skip)?;
        Ok(PointerTool { simple })
    }
}

#[derive(Debug, Clone)]
pub struct CallButton {
    pub simple: SimpleObject,
    pub lift: Option<ObjRef>,
    pub button_id: u8,
}

impl CallButton {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let simple = SimpleObject::read(d)?;
        let lift = d.resolve(Required::Exact(ObjectType::Lift))?;
        let button_id = d.reader.read_u8()?;
        Ok(CallButton {
            simple,
            lift,
            button_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Scenery {
    pub base: ObjectData,
    pub entity: ObjRef,
}

impl Scenery {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let base = ObjectData::read(d)?;
        let entity = match d.resolve(Required::Exact(ObjectType::Entity))? {
            Some(entity) => entity,
            None => return Err(Error::MissingRequiredReference("scenery entity")),
        };
        Ok(Scenery { base, entity })
    }
}

fn check_zero16(d: &mut Decoder, what: &str) -> Result<()> {
    let v = d.reader.read_u16()?;
    if v != 0 {
        return Err(Error::MalformedRecord(format!(
            "non-zero {what}: {v:#06x}"
        )));
    }
    Ok(())
}
