//! Save-file format version and the closed set of serialized class types.

use crate::error::{Error, Result};

/// On-disk format revision, declared by the root map record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    Legacy,
    Modern,
}

impl Version {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Version::Legacy),
            1 => Some(Version::Modern),
            _ => None,
        }
    }

    pub fn is_modern(self) -> bool {
        self == Version::Modern
    }

    /// Number of integer variable slots carried by every object.
    pub fn variable_count(self) -> usize {
        match self {
            Version::Legacy => 3,
            Version::Modern => 100,
        }
    }
}

/// Concrete serialized class types, tagged with their on-disk ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectType {
    MapData = 1,
    Gallery = 2,
    Door = 3,
    Room = 4,
    Entity = 5,
    CompoundObject = 6,
    Blackboard = 7,
    Vehicle = 8,
    Lift = 9,
    SimpleObject = 10,
    PointerTool = 11,
    CallButton = 12,
    Scenery = 13,
    Macro = 14,
}

impl ObjectType {
    /// Map a class name found in the stream to its type tag. The set of
    /// names is closed; anything else is fatal.
    pub fn from_class_name(name: &str) -> Result<Self> {
        Ok(match name {
            "MapData" => ObjectType::MapData,
            "CGallery" => ObjectType::Gallery,
            "CDoor" => ObjectType::Door,
            "CRoom" => ObjectType::Room,
            "Entity" => ObjectType::Entity,
            "CompoundObject" => ObjectType::CompoundObject,
            "Blackboard" => ObjectType::Blackboard,
            "Vehicle" => ObjectType::Vehicle,
            "Lift" => ObjectType::Lift,
            "SimpleObject" => ObjectType::SimpleObject,
            "PointerTool" => ObjectType::PointerTool,
            "CallButton" => ObjectType::CallButton,
            "Scenery" => ObjectType::Scenery,
            "Macro" => ObjectType::Macro,
            _ => return Err(Error::UnknownClass(name.to_owned())),
        })
    }
}

/// What a reference site is willing to accept. `Object` and `Compound` are
/// abstract acceptance categories over numeric tag ranges; they are never
/// concrete decode targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Required {
    Any,
    Object,
    Compound,
    Exact(ObjectType),
}

pub fn accepts(actual: ObjectType, required: Required) -> bool {
    match required {
        Required::Any => true,
        Required::Exact(t) => actual == t,
        Required::Object => actual as u8 >= ObjectType::CompoundObject as u8,
        Required::Compound => {
            let tag = actual as u8;
            tag >= ObjectType::CompoundObject as u8 && tag <= ObjectType::Lift as u8
        }
    }
}
