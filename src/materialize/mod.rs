//! Second pass: walk the decoded graph and drive the world builder.
//!
//! Decoding has fully completed by the time this runs, so every reference
//! can be resolved. Each decoded object is materialized at most once; a
//! node reachable through several parents gets one live agent, whichever
//! path reaches it first.

use tracing::warn;

use crate::codec::{
    Blackboard, CallButton, CompoundObject, Entity, Gallery, Lift, MapRoom, ObjRef, ObjectData,
    Record, Room, SaveFile, Scenery, SimpleObject, Vehicle, Version, HOTSPOT_COUNT,
};
use crate::error::{Error, Result};
use crate::world::{
    AgentAttributes, AgentId, AgentSpec, AgentState, BlackboardStyle, HotspotSpec, LiftState,
    MapRegionSpec, PartAnimation, PartPose, PartSpec, PhysicsState, RoomId, RoomProperties,
    RoomSpec, ScriptKey, SpriteSpec, VehicleState, WorldBuilder,
};

/// Event queued on every freshly created agent, announcing that it has
/// entered scope.
const EVENT_ENTER_SCOPE: u16 = 7;

/// One entry of the variable patch table: for live agents matching the
/// classifier under the given version, the named variable slot holds an
/// encoded object id rather than a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariablePatch {
    pub version: Version,
    pub family: u8,
    pub genus: u8,
    pub species: u16,
    pub slot: usize,
}

/// Known objects that persist references to other objects inside integer
/// variables. Tied to particular object catalogs; callers with unusual
/// content can pass their own table.
pub const DEFAULT_VARIABLE_PATCHES: &[VariablePatch] = &[
    // Pitz
    VariablePatch { version: Version::Modern, family: 2, genus: 20, species: 10, slot: 10 },
    // bees
    VariablePatch { version: Version::Modern, family: 2, genus: 17, species: 2, slot: 1 },
    // flask
    VariablePatch { version: Version::Modern, family: 2, genus: 1, species: 50, slot: 0 },
    // tomatoes
    VariablePatch { version: Version::Modern, family: 2, genus: 25, species: 1, slot: 1 },
    // nuts
    VariablePatch { version: Version::Modern, family: 2, genus: 25, species: 6, slot: 1 },
];

/// Materialize a decoded save file into the world, using the default
/// variable patch table.
pub fn materialize(file: &SaveFile, world: &mut dyn WorldBuilder) -> Result<()> {
    materialize_with_patches(file, world, DEFAULT_VARIABLE_PATCHES)
}

pub fn materialize_with_patches(
    file: &SaveFile,
    world: &mut dyn WorldBuilder,
    patches: &[VariablePatch],
) -> Result<()> {
    Materializer {
        file,
        world,
        patches,
        agents: vec![None; file.slot_count()],
    }
    .run()
}

struct Materializer<'a> {
    file: &'a SaveFile,
    world: &'a mut dyn WorldBuilder,
    patches: &'a [VariablePatch],
    /// Live handle per registry slot, filled in first-materialization-wins
    /// order.
    agents: Vec<Option<AgentId>>,
}

/// Map region geometry is not stored in the save file.
const REGION_WIDTH: u32 = 8352;

impl<'a> Materializer<'a> {
    fn run(mut self) -> Result<()> {
        self.build_map()?;

        for script in &self.file.scripts {
            let key = ScriptKey {
                family: script.family,
                genus: script.genus,
                species: script.species,
                event: script.event,
            };
            if let Err(e) = self.world.install_script(&key, &script.text) {
                warn!(?key, error = %e, "script installation failed");
            }
        }

        for &obj in &self.file.objects {
            self.materialize_object(obj)?;
        }
        for &obj in &self.file.scenery {
            self.materialize_object(obj)?;
        }

        for &m in &self.file.macros {
            self.activate_macro(m)?;
        }

        self.world.move_camera(self.file.scroll_x, self.file.scroll_y)?;

        self.apply_patches()?;

        Ok(())
    }

    fn build_map(&mut self) -> Result<()> {
        let file = self.file;
        let map = file.map_data()?;
        let background = file.gallery(map.background)?;

        let height = match file.version {
            Version::Legacy => 1200,
            Version::Modern => 2400,
        };
        self.world.add_map_region(&MapRegionSpec {
            x: 0,
            y: 0,
            width: REGION_WIDTH,
            height,
            background: background.filename.clone(),
        })?;

        for map_room in &map.rooms {
            let room = self.resolve_room(map_room)?;
            let assigned = self.world.add_room(&RoomSpec {
                id: room.id,
                left: room.left,
                top: room.top,
                right: room.right,
                bottom: room.bottom,
                room_type: room.room_type,
            })?;
            if assigned != room.id {
                return Err(Error::MalformedRecord(format!(
                    "room id {} came back as {assigned}",
                    room.id
                )));
            }

            if file.version.is_modern() {
                self.world.set_room_properties(
                    room.id,
                    &RoomProperties {
                        floor_points: room.floor_points.clone(),
                        floor_value: room.floor_value,
                        inorganic_nutrients: room.inorganic_nutrients,
                        organic_nutrients: room.organic_nutrients,
                        temperature: room.temperature,
                        heat_source: room.heat_source,
                        pressure: room.pressure,
                        pressure_source: room.pressure_source,
                        light_level: room.light_level,
                        light_source: room.light_source,
                        radiation: room.radiation,
                        radiation_source: room.radiation_source,
                        wind_x: room.wind_x,
                        wind_y: room.wind_y,
                        music: room.music.clone(),
                        drop_status: room.drop_status,
                    },
                )?;
            }
        }

        match file.version {
            Version::Legacy => self.world.add_ground_levels(&map.ground_levels)?,
            Version::Modern => self.wire_doors()?,
        }

        Ok(())
    }

    /// Doors are declared from both endpoint rooms. The first declaration
    /// creates the permeability link; the second must agree with it.
    fn wire_doors(&mut self) -> Result<()> {
        let file = self.file;
        let map = file.map_data()?;
        for map_room in &map.rooms {
            let room = self.resolve_room(map_room)?;
            for edge in &room.doors {
                for &door_ref in edge {
                    let door = match file.record(door_ref)? {
                        Record::Door(door) => door,
                        _ => {
                            return Err(Error::MalformedRecord(format!(
                                "slot {} is not a door",
                                door_ref.index()
                            )))
                        }
                    };
                    let a = room.id;
                    let b = door.other_room as RoomId;
                    match self.world.door_permeability(a, b) {
                        None => self.world.set_door_permeability(a, b, door.openness)?,
                        Some(existing) if existing == door.openness => {}
                        Some(existing) => {
                            return Err(Error::MalformedRecord(format!(
                                "door between rooms {a} and {b} declared with openness \
                                 {existing} and {}",
                                door.openness
                            )))
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn resolve_room(&self, map_room: &'a MapRoom) -> Result<&'a Room> {
        match map_room {
            MapRoom::Inline(room) => Ok(room),
            MapRoom::Slot(r) => self.file.room(*r),
        }
    }

    /// Create the live agent for one decoded object, or return the handle
    /// it already got through another path.
    fn materialize_object(&mut self, r: ObjRef) -> Result<AgentId> {
        if let Some(agent) = self.agents[r.index()] {
            return Ok(agent);
        }

        let file = self.file;
        let agent = match file.record(r)? {
            Record::CompoundObject(o) => self.build_compound(r, o)?,
            Record::Blackboard(o) => self.build_blackboard(r, o)?,
            Record::Vehicle(o) => self.build_vehicle(r, o)?,
            Record::Lift(o) => self.build_lift(r, o)?,
            Record::SimpleObject(o) => self.build_simple(r, o)?,
            Record::PointerTool(o) => {
                let spec = self.simple_agent_spec(&o.simple)?;
                let agent = self.world.adopt_pointer(&spec)?;
                self.remember(r, agent);
                self.apply_simple(agent, &o.simple)?;
                agent
            }
            Record::CallButton(o) => self.build_call_button(r, o)?,
            Record::Scenery(o) => self.build_scenery(r, o)?,
            other => {
                return Err(Error::MalformedRecord(format!(
                    "cannot materialize record {other:?} as an object"
                )))
            }
        };
        Ok(agent)
    }

    fn remember(&mut self, r: ObjRef, agent: AgentId) {
        self.agents[r.index()] = Some(agent);
    }

    fn sprite_spec(&self, gallery: &Gallery) -> SpriteSpec {
        SpriteSpec {
            filename: gallery.filename.clone(),
            first_image: gallery.first_image,
            frame_count: gallery.frame_count,
        }
    }

    /// Compound agents take their identity sprite and position from their
    /// first part.
    fn compound_agent_spec(&self, o: &CompoundObject) -> Result<AgentSpec> {
        let file = self.file;
        let first = file.entity(o.first_part()?)?;
        let sprite = file.gallery(first.sprite)?;
        Ok(AgentSpec {
            family: o.base.family,
            genus: o.base.genus,
            species: o.base.species,
            z_order: first.z_order,
            sprite: self.sprite_spec(sprite),
            x: first.x,
            y: first.y,
        })
    }

    /// Simple agents use their object-level sprite but the entity's
    /// z-order and position.
    fn simple_agent_spec(&self, o: &SimpleObject) -> Result<AgentSpec> {
        let file = self.file;
        let entity = file.entity(o.entity)?;
        let sprite = file.gallery(o.base.sprite)?;
        Ok(AgentSpec {
            family: o.base.family,
            genus: o.base.genus,
            species: o.base.species,
            z_order: entity.z_order,
            sprite: self.sprite_spec(sprite),
            x: entity.x,
            y: entity.y,
        })
    }

    fn build_compound(&mut self, r: ObjRef, o: &'a CompoundObject) -> Result<AgentId> {
        let spec = self.compound_agent_spec(o)?;
        let agent = self.world.create_agent(&spec)?;
        self.remember(r, agent);
        self.apply_compound(agent, o)?;
        Ok(agent)
    }

    fn build_blackboard(&mut self, r: ObjRef, o: &'a Blackboard) -> Result<AgentId> {
        let spec = self.compound_agent_spec(&o.compound)?;
        let agent = self.world.create_agent(&spec)?;
        self.remember(r, agent);
        self.apply_compound(agent, &o.compound)?;
        self.world.set_blackboard_text_style(
            agent,
            &BlackboardStyle {
                background_colour: o.background_colour,
                chalk_colour: o.chalk_colour,
                alias_colour: o.alias_colour,
                text_x: o.text_x,
                text_y: o.text_y,
            },
        )?;
        for (index, (value, label)) in o.words.iter().enumerate() {
            let translated = self.world.translate_word(label);
            self.world
                .add_blackboard_word(agent, index, *value, &translated)?;
        }
        Ok(agent)
    }

    fn build_vehicle(&mut self, r: ObjRef, o: &'a Vehicle) -> Result<AgentId> {
        let spec = self.compound_agent_spec(&o.compound)?;
        let agent = self.world.create_agent(&spec)?;
        self.remember(r, agent);
        self.apply_compound(agent, &o.compound)?;
        self.apply_vehicle(agent, o)?;
        Ok(agent)
    }

    fn build_lift(&mut self, r: ObjRef, o: &'a Lift) -> Result<AgentId> {
        let spec = self.compound_agent_spec(&o.vehicle.compound)?;
        let agent = self.world.create_agent(&spec)?;
        self.remember(r, agent);
        self.apply_compound(agent, &o.vehicle.compound)?;
        self.apply_vehicle(agent, &o.vehicle)?;
        self.world.set_lift_state(
            agent,
            &LiftState {
                current_button: o.current_button,
                button_y: o.button_y[..o.button_count as usize].to_vec(),
                align_with_cabin: self
                    .file
                    .version
                    .is_modern()
                    .then_some(o.align_with_cabin),
            },
        )?;
        Ok(agent)
    }

    fn build_simple(&mut self, r: ObjRef, o: &'a SimpleObject) -> Result<AgentId> {
        let spec = self.simple_agent_spec(o)?;
        let agent = self.world.create_agent(&spec)?;
        self.remember(r, agent);
        self.apply_simple(agent, o)?;
        Ok(agent)
    }

    fn build_call_button(&mut self, r: ObjRef, o: &'a CallButton) -> Result<AgentId> {
        let spec = self.simple_agent_spec(&o.simple)?;
        let agent = self.world.create_agent(&spec)?;
        self.remember(r, agent);
        self.apply_simple(agent, &o.simple)?;

        let lift_ref = o
            .lift
            .ok_or(Error::MissingRequiredReference("call button lift"))?;
        let lift = self.materialize_object(lift_ref)?;
        self.world.link_call_button(agent, lift, o.button_id)?;
        Ok(agent)
    }

    fn build_scenery(&mut self, r: ObjRef, o: &'a Scenery) -> Result<AgentId> {
        let file = self.file;
        let entity = file.entity(o.entity)?;
        let sprite = file.gallery(o.base.sprite)?;
        let spec = AgentSpec {
            family: o.base.family,
            genus: o.base.genus,
            species: o.base.species,
            z_order: entity.z_order,
            sprite: self.sprite_spec(sprite),
            x: entity.x,
            y: entity.y,
        };
        let agent = self.world.create_agent(&spec)?;
        self.remember(r, agent);
        self.world.queue_event(agent, EVENT_ENTER_SCOPE)?;

        self.apply_object_state(agent, &o.base)?;
        self.world.set_part_pose(agent, 0, &part_pose(entity)?)?;
        self.world.set_part_transparent(agent, 0, true)?;
        if let Some(token) = &o.base.current_sound {
            self.world.play_looping_sound(agent, token)?;
        }
        Ok(agent)
    }

    fn apply_object_state(&mut self, agent: AgentId, base: &ObjectData) -> Result<()> {
        // A timer that has fully counted up restarts from zero.
        let ticks = if base.tick_state == base.tick_reset {
            0
        } else {
            base.tick_state
        };
        self.world.set_agent_state(
            agent,
            &AgentState {
                attributes: AgentAttributes::from_bits_retain(base.attributes),
                activation: base.activation,
                timer_rate: base.tick_reset,
                ticks_since_timer: ticks,
                unid: base.unid,
            },
        )?;

        for (slot, &value) in base.variables.iter().enumerate() {
            self.world.set_variable_int(agent, slot, value)?;
        }

        if let Some(p) = &base.physics {
            self.world.set_physics(
                agent,
                &PhysicsState {
                    size: p.size,
                    range: p.range,
                    threat: p.threat,
                    acceleration: p.acceleration,
                    velocity_x: p.velocity_x,
                    velocity_y: p.velocity_y,
                    restitution: p.restitution,
                    aerodynamics: p.aerodynamics,
                    falling: p.falling(),
                    frozen: p.frozen,
                },
            )?;
        }
        Ok(())
    }

    fn apply_compound(&mut self, agent: AgentId, o: &'a CompoundObject) -> Result<()> {
        let file = self.file;
        self.world.queue_event(agent, EVENT_ENTER_SCOPE)?;
        self.apply_object_state(agent, &o.base)?;

        // Part z-orders are normalized so the lowest part sits at zero.
        let mut base_z = i32::MAX;
        for part in &o.parts {
            if let Some(entity) = part.entity {
                base_z = base_z.min(file.entity(entity)?.z_order);
            }
        }

        for (index, part) in o.parts.iter().enumerate() {
            let Some(entity_ref) = part.entity else {
                continue;
            };
            let entity = file.entity(entity_ref)?;
            let sprite = file.gallery(entity.sprite)?;
            self.world.attach_part(
                agent,
                &PartSpec {
                    index: index as u32,
                    sprite: self.sprite_spec(sprite),
                    rel_x: part.rel_x,
                    rel_y: part.rel_y,
                    z_order: entity.z_order - base_z,
                    pose: part_pose(entity)?,
                },
            )?;
        }

        let mut hotspots = [HotspotSpec::default(); HOTSPOT_COUNT];
        for (spec, hotspot) in hotspots.iter_mut().zip(o.hotspots.iter()) {
            *spec = HotspotSpec {
                left: hotspot.left,
                top: hotspot.top,
                right: hotspot.right,
                bottom: hotspot.bottom,
                function: hotspot.function,
                message: file.version.is_modern().then_some(hotspot.message),
                mask: file.version.is_modern().then_some(hotspot.mask),
            };
        }
        self.world.set_hotspots(agent, &hotspots)?;
        Ok(())
    }

    fn apply_vehicle(&mut self, agent: AgentId, o: &Vehicle) -> Result<()> {
        self.world.set_vehicle_state(
            agent,
            &VehicleState {
                velocity_x: o.velocity_x,
                velocity_y: o.velocity_y,
                cabin: (o.cabin_left, o.cabin_top, o.cabin_right, o.cabin_bottom),
                bump: o.bump,
            },
        )
    }

    fn apply_simple(&mut self, agent: AgentId, o: &'a SimpleObject) -> Result<()> {
        let file = self.file;
        self.world.queue_event(agent, EVENT_ENTER_SCOPE)?;
        self.apply_object_state(agent, &o.base)?;
        self.world
            .set_click_behaviour(agent, o.click_behaviour, o.touch_behaviour)?;

        let entity = file.entity(o.entity)?;
        self.world.set_part_pose(agent, 0, &part_pose(entity)?)?;

        for (index, &point) in o.pickup_handles.iter().enumerate() {
            if point != (-1, -1) {
                self.world.set_pickup_handle(agent, index, point)?;
            }
        }
        for (index, &point) in o.pickup_points.iter().enumerate() {
            if point != (-1, -1) {
                self.world.set_pickup_point(agent, index, point)?;
            }
        }

        if let Some(token) = &o.base.current_sound {
            self.world.play_looping_sound(agent, token)?;
        }
        Ok(())
    }

    /// Restart a saved running script on its owner. The matching installed
    /// script is found by classifier plus script text; no match is a
    /// degraded-but-valid outcome.
    fn activate_macro(&mut self, r: ObjRef) -> Result<()> {
        let file = self.file;
        let m = match file.record(r)? {
            Record::Macro(m) => m,
            other => {
                return Err(Error::MalformedRecord(format!(
                    "slot {} is not a macro: {other:?}",
                    r.index()
                )))
            }
        };

        let Some(owner_ref) = m.owner else {
            warn!("macro has no owner, skipping");
            return Ok(());
        };
        let owner = self.materialize_object(owner_ref)?;
        let data = file.object_data(owner_ref)?;

        for script in &file.scripts {
            if script.family != data.family
                || script.genus != data.genus
                || script.species != data.species
                || script.text != m.text
            {
                continue;
            }
            // Event zero means the script never fired; restarting it needs
            // the owner flagged active.
            let force_active = script.event == 0;
            return self.world.resume_script(owner, script.event, force_active);
        }

        warn!(
            family = data.family,
            genus = data.genus,
            species = data.species,
            "no installed script matches saved macro, leaving it unresumed"
        );
        Ok(())
    }

    /// Replace integer variables that encode object ids with live agent
    /// references, per the patch table. Every materialized agent is a
    /// candidate, scenery included.
    fn apply_patches(&mut self) -> Result<()> {
        let file = self.file;
        let all_objects = || file.objects.iter().chain(file.scenery.iter());
        for patch in self.patches {
            if patch.version != file.version {
                continue;
            }
            for &obj in all_objects() {
                let data = file.object_data(obj)?;
                if (data.family, data.genus, data.species)
                    != (patch.family, patch.genus, patch.species)
                {
                    continue;
                }
                let Some(agent) = self.agents[obj.index()] else {
                    continue;
                };
                let Some(value) = self.world.variable_int(agent, patch.slot) else {
                    continue;
                };

                let target = all_objects()
                    .find(|&&other| {
                        file.object_data(other)
                            .map(|d| d.unid == value)
                            .unwrap_or(false)
                    })
                    .and_then(|&other| self.agents[other.index()]);

                if target.is_none() {
                    warn!(
                        family = patch.family,
                        genus = patch.genus,
                        species = patch.species,
                        slot = patch.slot,
                        value,
                        "variable patch target not found, clearing slot"
                    );
                }
                self.world.set_variable_agent(agent, patch.slot, target)?;
            }
        }
        Ok(())
    }
}

/// Convert a decoded entity's frame and animation state into part pose
/// data. Animation descriptors are digit strings with 'R' as the loop
/// marker.
fn part_pose(entity: &Entity) -> Result<PartPose> {
    let base = entity.image_offset;
    let pose = entity.current_frame as i32 - entity.image_offset as i32;

    let animation = match &entity.animation {
        None => None,
        Some(anim) => {
            let mut frames = Vec::with_capacity(anim.descriptor.len());
            for c in anim.descriptor.chars() {
                match c {
                    'R' => frames.push(255),
                    '0'..='9' => frames.push(c as u8 - b'0'),
                    other => {
                        return Err(Error::MalformedRecord(format!(
                            "bad animation character {other:?}"
                        )))
                    }
                }
            }
            let position = anim.frame as usize;
            if position < frames.len() {
                let position = if frames[position] == 255 { 0 } else { position };
                Some(PartAnimation { frames, position })
            } else {
                // Saved animation position ran off the end; drop the
                // animation rather than resume it out of range.
                None
            }
        }
    };

    Ok(PartPose {
        base,
        pose,
        animation,
    })
}
