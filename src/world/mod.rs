//! The world-builder collaborator surface.
//!
//! Materialization does not touch the simulation directly; everything it
//! does goes through [`WorldBuilder`]. The host engine implements this
//! trait; tests use a recording mock.

use bitflags::bitflags;

use crate::error::Result;

/// Handle to a live agent, chosen by the builder.
pub type AgentId = u32;

/// Room id. Room ids are persisted in the save file and the builder must
/// honour the requested value.
pub type RoomId = u32;

bitflags! {
    /// Agent attribute bitmask. Unknown bits are preserved as read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AgentAttributes: u16 {
        const CARRYABLE   = 0x01;
        const MOUSEABLE   = 0x02;
        const ACTIVATEABLE = 0x04;
        const CONTAINER   = 0x08;
        const INVISIBLE   = 0x10;
        const FLOATABLE   = 0x20;
        const WALL_BOUND  = 0x40;
        const GROUND_BOUND = 0x80;
    }
}

/// The single map region a save file describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapRegionSpec {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Background sprite-file token.
    pub background: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSpec {
    /// The id the room must come back with.
    pub id: RoomId,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub room_type: u32,
}

/// Modern-only room state beyond geometry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomProperties {
    pub floor_points: Vec<(u32, u32)>,
    pub floor_value: u8,
    pub inorganic_nutrients: u8,
    pub organic_nutrients: u8,
    pub temperature: u8,
    pub heat_source: i32,
    pub pressure: u8,
    pub pressure_source: i32,
    pub light_level: u8,
    pub light_source: i32,
    pub radiation: u8,
    pub radiation_source: i32,
    pub wind_x: i32,
    pub wind_y: i32,
    pub music: String,
    pub drop_status: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpriteSpec {
    pub filename: String,
    pub first_image: u32,
    pub frame_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub family: u8,
    pub genus: u8,
    pub species: u16,
    pub z_order: i32,
    pub sprite: SpriteSpec,
    pub x: u32,
    pub y: u32,
}

/// Frame/animation state applied to one visual part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartPose {
    /// Frame offset from the start of the sprite gallery.
    pub base: u8,
    /// Current pose relative to the base frame.
    pub pose: i32,
    pub animation: Option<PartAnimation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartAnimation {
    /// Frame sequence; 255 is the loop marker.
    pub frames: Vec<u8>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSpec {
    pub index: u32,
    pub sprite: SpriteSpec,
    pub rel_x: u32,
    pub rel_y: u32,
    pub z_order: i32,
    pub pose: PartPose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentState {
    pub attributes: AgentAttributes,
    pub activation: u8,
    pub timer_rate: u32,
    pub ticks_since_timer: u32,
    /// Persisted world-unique id; zero when the save format has none.
    pub unid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicsState {
    pub size: u8,
    pub range: u32,
    pub threat: u8,
    pub acceleration: u32,
    pub velocity_x: i32,
    pub velocity_y: i32,
    pub restitution: u32,
    pub aerodynamics: u32,
    pub falling: bool,
    pub frozen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HotspotSpec {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub function: i32,
    pub message: Option<u16>,
    pub mask: Option<u8>,
}

/// How a blackboard renders its chalked word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlackboardStyle {
    pub background_colour: u32,
    pub chalk_colour: u32,
    pub alias_colour: u32,
    pub text_x: u8,
    pub text_y: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleState {
    pub velocity_x: i32,
    pub velocity_y: i32,
    pub cabin: (u32, u32, u32, u32),
    pub bump: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiftState {
    pub current_button: u32,
    pub button_y: Vec<u32>,
    pub align_with_cabin: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptKey {
    pub family: u8,
    pub genus: u8,
    pub species: u16,
    pub event: u16,
}

/// Everything materialization needs from the host simulation.
pub trait WorldBuilder {
    fn add_map_region(&mut self, region: &MapRegionSpec) -> Result<()>;
    fn add_room(&mut self, room: &RoomSpec) -> Result<RoomId>;
    fn set_room_properties(&mut self, room: RoomId, props: &RoomProperties) -> Result<()>;
    fn add_ground_levels(&mut self, levels: &[u32]) -> Result<()>;
    fn door_permeability(&self, a: RoomId, b: RoomId) -> Option<u8>;
    fn set_door_permeability(&mut self, a: RoomId, b: RoomId, openness: u8) -> Result<()>;

    fn create_agent(&mut self, spec: &AgentSpec) -> Result<AgentId>;
    /// Hand over the already-live pointer agent, reconfigured to `spec`.
    fn adopt_pointer(&mut self, spec: &AgentSpec) -> Result<AgentId>;
    fn attach_part(&mut self, agent: AgentId, part: &PartSpec) -> Result<()>;
    fn set_part_pose(&mut self, agent: AgentId, part: u32, pose: &PartPose) -> Result<()>;
    fn set_part_transparent(&mut self, agent: AgentId, part: u32, transparent: bool)
        -> Result<()>;
    fn set_agent_state(&mut self, agent: AgentId, state: &AgentState) -> Result<()>;
    fn set_physics(&mut self, agent: AgentId, physics: &PhysicsState) -> Result<()>;
    fn set_hotspots(&mut self, agent: AgentId, hotspots: &[HotspotSpec]) -> Result<()>;
    fn set_click_behaviour(&mut self, agent: AgentId, clicks: [i8; 3], touch: u8) -> Result<()>;
    fn set_pickup_handle(&mut self, agent: AgentId, index: usize, point: (i32, i32))
        -> Result<()>;
    fn set_pickup_point(&mut self, agent: AgentId, index: usize, point: (i32, i32))
        -> Result<()>;
    fn set_vehicle_state(&mut self, agent: AgentId, state: &VehicleState) -> Result<()>;
    fn set_lift_state(&mut self, agent: AgentId, state: &LiftState) -> Result<()>;
    fn link_call_button(&mut self, button: AgentId, lift: AgentId, button_id: u8) -> Result<()>;
    fn set_blackboard_text_style(&mut self, agent: AgentId, style: &BlackboardStyle)
        -> Result<()>;
    fn add_blackboard_word(
        &mut self,
        agent: AgentId,
        index: usize,
        value: u32,
        label: &str,
    ) -> Result<()>;
    fn play_looping_sound(&mut self, agent: AgentId, token: &str) -> Result<()>;
    fn queue_event(&mut self, agent: AgentId, event: u16) -> Result<()>;

    fn variable_int(&self, agent: AgentId, slot: usize) -> Option<u32>;
    fn set_variable_int(&mut self, agent: AgentId, slot: usize, value: u32) -> Result<()>;
    fn set_variable_agent(
        &mut self,
        agent: AgentId,
        slot: usize,
        target: Option<AgentId>,
    ) -> Result<()>;

    fn install_script(&mut self, key: &ScriptKey, text: &str) -> Result<()>;
    fn resume_script(&mut self, agent: AgentId, event: u16, force_active: bool) -> Result<()>;

    /// Translate a blackboard word through the host's token table.
    fn translate_word(&self, word: &str) -> String;
    fn move_camera(&mut self, x: u32, y: u32) -> Result<()>;
}
