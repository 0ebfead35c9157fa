//! Shared test fixtures: a little-endian stream builder that speaks the
//! reference protocol, canned save-file images, and a recording world
//! builder.

use std::collections::HashMap;

use crate::codec::{
    Entity, Gallery, ObjRef, ObjectData, Physics, Record, SaveFile, Slot, Version,
};
use crate::error::Result;
use crate::world::{
    AgentId, AgentSpec, AgentState, BlackboardStyle, HotspotSpec, LiftState, MapRegionSpec,
    PartPose, PartSpec, PhysicsState, RoomId, RoomProperties, RoomSpec, ScriptKey, VehicleState,
    WorldBuilder,
};

/// Handle to a slot declared through [`StreamBuilder::declare`].
pub(crate) type SlotHandle = u16;

/// Builds encoded byte streams for decoder tests. Tracks declaration order
/// so references can be written symbolically.
pub(crate) struct StreamBuilder {
    buf: Vec<u8>,
    slots: u16,
}

impl StreamBuilder {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::new(),
            slots: 0,
        }
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub(crate) fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Writes a string with the escalating length prefix.
    pub(crate) fn string(&mut self, s: &str) {
        let len = s.len();
        if len < 0xff {
            self.u8(len as u8);
        } else if len < 0xffff {
            self.u8(0xff);
            self.u16(len as u16);
        } else {
            self.u8(0xff);
            self.u16(0xffff);
            self.u32(len as u32);
        }
        self.bytes(s.as_bytes());
    }

    /// Writes a first-encounter class declaration and returns the handle
    /// of the slot it occupies. The instance body must follow.
    pub(crate) fn declare(&mut self, class: &str) -> SlotHandle {
        self.u16(0xffff);
        self.u16(0); // schema id, unused
        self.u16(class.len() as u16);
        self.bytes(class.as_bytes());
        let handle = self.slots;
        self.slots += 1;
        handle
    }

    /// Writes a back-reference to an already-instantiated slot.
    pub(crate) fn backref(&mut self, slot: SlotHandle) {
        self.u16(slot + 1);
    }

    /// Writes a new-instance reference to a declared slot. The instance
    /// body must follow.
    pub(crate) fn instance_of(&mut self, slot: SlotHandle) {
        self.u16(0x8000 | (slot + 1));
    }
}

/// Writes a complete gallery record (declaration plus body) with one
/// frame. `name` must be exactly four characters.
pub(crate) fn push_gallery(sb: &mut StreamBuilder, name: &str) -> SlotHandle {
    assert_eq!(name.len(), 4);
    let handle = sb.declare("CGallery");
    sb.u32(1); // frame count
    sb.bytes(name.as_bytes());
    sb.u32(0); // first image
    sb.u32(0);
    sb.bytes(&[0; 15]); // per-frame geometry
    handle
}

/// Writes a complete entity record with a fresh gallery and no animation.
pub(crate) fn push_entity_new(sb: &mut StreamBuilder) -> SlotHandle {
    let handle = sb.declare("Entity");
    push_gallery(sb, "spr0");
    sb.u8(0); // current frame
    sb.u8(0); // image offset
    sb.i32(0); // z-order
    sb.u32(0); // x
    sb.u32(0); // y
    sb.u8(0); // no animation
    handle
}

/// Knobs for [`push_object_base`]. Everything not named here is zeroed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ObjectBaseParams {
    pub family: u8,
    pub genus: u8,
    pub species: u16,
    pub unid: u32,
    pub attributes: u16,
    pub activation: u8,
    pub tick_reset: u32,
    pub tick_state: u32,
}

impl Default for ObjectBaseParams {
    fn default() -> Self {
        Self {
            family: 2,
            genus: 1,
            species: 1,
            unid: 0,
            attributes: 0,
            activation: 0,
            tick_reset: 0,
            tick_state: 0,
        }
    }
}

/// Writes the object-base portion shared by every agent kind, including
/// its own sprite gallery. Follows the per-version layout byte for byte.
pub(crate) fn push_object_base(sb: &mut StreamBuilder, version: Version, p: ObjectBaseParams) {
    match version {
        Version::Legacy => {
            sb.u8(0); // unused classifier byte
            sb.u8(p.species as u8);
            sb.u8(p.genus);
            sb.u8(p.family);
            sb.u8(0); // unid slot, unused on legacy
            sb.u8(p.attributes as u8);
        }
        Version::Modern => {
            sb.u8(p.genus);
            sb.u8(p.family);
            sb.u16(0); // classifier pad
            sb.u16(p.species);
            sb.u32(p.unid);
            sb.u8(0);
            sb.u16(p.attributes);
            sb.u16(0); // attribute pad
        }
    }

    sb.u32(0); // left
    sb.u32(0); // top
    sb.u32(0); // right
    sb.u32(0); // bottom
    sb.u16(0);
    sb.u8(p.activation);

    push_gallery(sb, "obj0");

    sb.u32(p.tick_reset);
    sb.u32(p.tick_state);
    sb.u16(0); // tick pad
    sb.bytes(&[0; 4]); // no sound

    for _ in 0..version.variable_count() {
        sb.u32(0);
    }

    if version.is_modern() {
        sb.u8(0); // size
        sb.u32(0); // range
        sb.u32(0xffff_ffff); // not falling
        sb.u32(0); // acceleration
        sb.i32(0); // velocity x
        sb.i32(0); // velocity y
        sb.u32(0); // restitution
        sb.u32(0); // aerodynamics
        sb.bytes(&[0; 6]);
        sb.u8(0); // threat
        sb.u8(0); // flags
    }

    sb.u32(0); // no inline scripts
}

/// The map-record portion of a minimal legacy stream: version, background
/// gallery, no rooms, zeroed ground levels.
pub(crate) fn legacy_world_prefix() -> StreamBuilder {
    let mut sb = StreamBuilder::new();
    sb.declare("MapData");
    sb.u32(0); // legacy version
    sb.u32(0);
    push_gallery(&mut sb, "back");
    sb.u32(0); // no rooms
    for _ in 0..crate::codec::GROUND_LEVEL_COUNT {
        sb.u32(0);
    }
    sb.bytes(&[0; 800]);
    sb
}

/// A complete legacy stream containing nothing but the map record.
pub(crate) fn legacy_empty_world() -> StreamBuilder {
    let mut sb = legacy_world_prefix();
    sb.u32(0); // objects
    sb.u32(0); // scenery
    sb.u32(0); // scripts
    sb.u32(0); // scroll x
    sb.u32(0); // scroll y
    sb.u16(0);
    sb.string(""); // favourite place
    sb.u16(0);
    sb.u16(0);
    sb.bytes(&[0; 25]);
    sb.u16(0); // speech
    sb.u32(0); // macros
    sb
}

/// Assembles a [`SaveFile`] directly from pre-built slots, bypassing the
/// byte codec. Lists of top-level objects are filled in by the caller.
pub(crate) fn save_file(version: Version, slots: Vec<Slot>) -> SaveFile {
    SaveFile {
        version,
        map: ObjRef(0),
        objects: Vec::new(),
        scenery: Vec::new(),
        scripts: Vec::new(),
        scroll_x: 0,
        scroll_y: 0,
        favourite_place: Default::default(),
        speech_history: Vec::new(),
        macros: Vec::new(),
        slots,
    }
}

pub(crate) fn obj(index: usize) -> ObjRef {
    ObjRef(index)
}

pub(crate) fn gallery_record(name: &str) -> Record {
    Record::Gallery(Gallery {
        frame_count: 1,
        filename: name.to_owned(),
        first_image: 0,
    })
}

pub(crate) fn entity_record(sprite: ObjRef, x: u32, y: u32, z_order: i32) -> Record {
    Record::Entity(Entity {
        sprite,
        current_frame: 0,
        image_offset: 0,
        z_order,
        x,
        y,
        animation: None,
    })
}

/// A zeroed object base with the given classifier. Modern bases carry
/// at-rest physics.
pub(crate) fn object_base(
    version: Version,
    family: u8,
    genus: u8,
    species: u16,
    sprite: ObjRef,
) -> ObjectData {
    ObjectData {
        family,
        genus,
        species,
        unid: 0,
        attributes: 0,
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
        activation: 0,
        sprite,
        tick_reset: 0,
        tick_state: 0,
        current_sound: None,
        variables: vec![0; version.variable_count()],
        physics: version.is_modern().then(|| Physics {
            size: 0,
            range: 0,
            gravity_data: 0xffff_ffff,
            acceleration: 0,
            velocity_x: 0,
            velocity_y: 0,
            restitution: 0,
            aerodynamics: 0,
            threat: 0,
            frozen: false,
        }),
        scripts: Vec::new(),
    }
}

/// Value held in one recorded variable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VarValue {
    Int(u32),
    Agent(Option<AgentId>),
}

/// A [`WorldBuilder`] that records everything it is told. Agent ids are
/// handed out sequentially from 1; requested room ids are honoured.
#[derive(Default)]
pub(crate) struct MockWorld {
    pub regions: Vec<MapRegionSpec>,
    pub rooms: Vec<RoomSpec>,
    pub room_props: HashMap<RoomId, RoomProperties>,
    pub ground_levels: Vec<u32>,
    pub doors: HashMap<(RoomId, RoomId), u8>,
    pub agents: Vec<AgentSpec>,
    pub pointer: Option<AgentId>,
    pub parts: Vec<(AgentId, PartSpec)>,
    pub poses: Vec<(AgentId, u32, PartPose)>,
    pub transparent: Vec<(AgentId, u32, bool)>,
    pub states: HashMap<AgentId, AgentState>,
    pub physics: HashMap<AgentId, PhysicsState>,
    pub hotspots: HashMap<AgentId, Vec<HotspotSpec>>,
    pub clicks: HashMap<AgentId, ([i8; 3], u8)>,
    pub pickup_handles: Vec<(AgentId, usize, (i32, i32))>,
    pub pickup_points: Vec<(AgentId, usize, (i32, i32))>,
    pub vehicle_states: HashMap<AgentId, VehicleState>,
    pub lift_states: HashMap<AgentId, LiftState>,
    pub call_buttons: Vec<(AgentId, AgentId, u8)>,
    pub blackboard_styles: HashMap<AgentId, BlackboardStyle>,
    pub blackboard_words: Vec<(AgentId, usize, u32, String)>,
    pub sounds: Vec<(AgentId, String)>,
    pub queued: Vec<(AgentId, u16)>,
    pub variables: HashMap<(AgentId, usize), VarValue>,
    pub installed: Vec<(ScriptKey, String)>,
    pub resumed: Vec<(AgentId, u16, bool)>,
    pub camera: Option<(u32, u32)>,
    next_agent: AgentId,
}

impl MockWorld {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_agent(&mut self) -> AgentId {
        self.next_agent += 1;
        self.next_agent
    }

    fn door_key(a: RoomId, b: RoomId) -> (RoomId, RoomId) {
        (a.min(b), a.max(b))
    }
}

impl WorldBuilder for MockWorld {
    fn add_map_region(&mut self, region: &MapRegionSpec) -> Result<()> {
        self.regions.push(region.clone());
        Ok(())
    }

    fn add_room(&mut self, room: &RoomSpec) -> Result<RoomId> {
        self.rooms.push(room.clone());
        Ok(room.id)
    }

    fn set_room_properties(&mut self, room: RoomId, props: &RoomProperties) -> Result<()> {
        self.room_props.insert(room, props.clone());
        Ok(())
    }

    fn add_ground_levels(&mut self, levels: &[u32]) -> Result<()> {
        self.ground_levels.extend_from_slice(levels);
        Ok(())
    }

    fn door_permeability(&self, a: RoomId, b: RoomId) -> Option<u8> {
        self.doors.get(&Self::door_key(a, b)).copied()
    }

    fn set_door_permeability(&mut self, a: RoomId, b: RoomId, openness: u8) -> Result<()> {
        self.doors.insert(Self::door_key(a, b), openness);
        Ok(())
    }

    fn create_agent(&mut self, spec: &AgentSpec) -> Result<AgentId> {
        self.agents.push(spec.clone());
        Ok(self.next_agent())
    }

    fn adopt_pointer(&mut self, spec: &AgentSpec) -> Result<AgentId> {
        self.agents.push(spec.clone());
        let agent = self.next_agent();
        self.pointer = Some(agent);
        Ok(agent)
    }

    fn attach_part(&mut self, agent: AgentId, part: &PartSpec) -> Result<()> {
        self.parts.push((agent, part.clone()));
        Ok(())
    }

    fn set_part_pose(&mut self, agent: AgentId, part: u32, pose: &PartPose) -> Result<()> {
        self.poses.push((agent, part, pose.clone()));
        Ok(())
    }

    fn set_part_transparent(
        &mut self,
        agent: AgentId,
        part: u32,
        transparent: bool,
    ) -> Result<()> {
        self.transparent.push((agent, part, transparent));
        Ok(())
    }

    fn set_agent_state(&mut self, agent: AgentId, state: &AgentState) -> Result<()> {
        self.states.insert(agent, state.clone());
        Ok(())
    }

    fn set_physics(&mut self, agent: AgentId, physics: &PhysicsState) -> Result<()> {
        self.physics.insert(agent, physics.clone());
        Ok(())
    }

    fn set_hotspots(&mut self, agent: AgentId, hotspots: &[HotspotSpec]) -> Result<()> {
        self.hotspots.insert(agent, hotspots.to_vec());
        Ok(())
    }

    fn set_click_behaviour(&mut self, agent: AgentId, clicks: [i8; 3], touch: u8) -> Result<()> {
        self.clicks.insert(agent, (clicks, touch));
        Ok(())
    }

    fn set_pickup_handle(
        &mut self,
        agent: AgentId,
        index: usize,
        point: (i32, i32),
    ) -> Result<()> {
        self.pickup_handles.push((agent, index, point));
        Ok(())
    }

    fn set_pickup_point(
        &mut self,
        agent: AgentId,
        index: usize,
        point: (i32, i32),
    ) -> Result<()> {
        self.pickup_points.push((agent, index, point));
        Ok(())
    }

    fn set_vehicle_state(&mut self, agent: AgentId, state: &VehicleState) -> Result<()> {
        self.vehicle_states.insert(agent, state.clone());
        Ok(())
    }

    fn set_lift_state(&mut self, agent: AgentId, state: &LiftState) -> Result<()> {
        self.lift_states.insert(agent, state.clone());
        Ok(())
    }

    fn link_call_button(&mut self, button: AgentId, lift: AgentId, button_id: u8) -> Result<()> {
        self.call_buttons.push((button, lift, button_id));
        Ok(())
    }

    fn set_blackboard_text_style(
        &mut self,
        agent: AgentId,
        style: &BlackboardStyle,
    ) -> Result<()> {
        self.blackboard_styles.insert(agent, *style);
        Ok(())
    }

    fn add_blackboard_word(
        &mut self,
        agent: AgentId,
        index: usize,
        value: u32,
        label: &str,
    ) -> Result<()> {
        self.blackboard_words
            .push((agent, index, value, label.to_owned()));
        Ok(())
    }

    fn play_looping_sound(&mut self, agent: AgentId, token: &str) -> Result<()> {
        self.sounds.push((agent, token.to_owned()));
        Ok(())
    }

    fn queue_event(&mut self, agent: AgentId, event: u16) -> Result<()> {
        self.queued.push((agent, event));
        Ok(())
    }

    fn variable_int(&self, agent: AgentId, slot: usize) -> Option<u32> {
        match self.variables.get(&(agent, slot)) {
            Some(VarValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    fn set_variable_int(&mut self, agent: AgentId, slot: usize, value: u32) -> Result<()> {
        self.variables.insert((agent, slot), VarValue::Int(value));
        Ok(())
    }

    fn set_variable_agent(
        &mut self,
        agent: AgentId,
        slot: usize,
        target: Option<AgentId>,
    ) -> Result<()> {
        self.variables.insert((agent, slot), VarValue::Agent(target));
        Ok(())
    }

    fn install_script(&mut self, key: &ScriptKey, text: &str) -> Result<()> {
        self.installed.push((*key, text.to_owned()));
        Ok(())
    }

    fn resume_script(&mut self, agent: AgentId, event: u16, force_active: bool) -> Result<()> {
        self.resumed.push((agent, event, force_active));
        Ok(())
    }

    fn translate_word(&self, word: &str) -> String {
        format!("<{word}>")
    }

    fn move_camera(&mut self, x: u32, y: u32) -> Result<()> {
        self.camera = Some((x, y));
        Ok(())
    }
}
