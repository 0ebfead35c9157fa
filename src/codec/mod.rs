pub mod file;
pub mod map;
pub mod objects;
pub mod reader;
pub mod registry;
pub mod script;
pub mod types;

pub use file::{FavouritePlace, SaveFile};
pub use map::{Door, Gallery, MapData, MapRoom, Room, GROUND_LEVEL_COUNT};
pub use objects::{
    Animation, Blackboard, CallButton, CompoundObject, CompoundPart, Entity, Hotspot, Lift,
    ObjectData, Physics, PointerTool, Scenery, SimpleObject, Vehicle, HOTSPOT_COUNT,
    LIFT_BUTTON_SLOTS,
};
pub use reader::BinaryReader;
pub use registry::{Decoder, ObjRef, Record, Slot};
pub use script::{Macro, Script};
pub use types::{accepts, ObjectType, Required, Version};
