//! Installed scripts and saved running script instances.

use crate::codec::registry::{Decoder, ObjRef};
use crate::codec::types::{Required, Version};
use crate::error::{Error, Result};

/// A class-level script keyed by classifier and event number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub family: u8,
    pub genus: u8,
    pub species: u16,
    pub event: u16,
    pub text: String,
}

impl Script {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        let (family, genus, species, event);
        match d.version()? {
            Version::Legacy => {
                event = d.reader.read_u8()? as u16;
                species = d.reader.read_u8()? as u16;
                genus = d.reader.read_u8()?;
                family = d.reader.read_u8()?;
            }
            Version::Modern => {
                genus = d.reader.read_u8()?;
                family = d.reader.read_u8()?;
                event = d.reader.read_u16()?;
                species = d.reader.read_u16()?;
            }
        }
        let text = d.reader.read_string()?;
        Ok(Script {
            family,
            genus,
            species,
            event,
            text,
        })
    }
}

/// A running script instance saved mid-execution. Only enough survives the
/// round trip to find the matching installed script and restart it.
#[derive(Debug, Clone)]
pub struct Macro {
    pub text: String,
    pub owner: Option<ObjRef>,
    pub from: Option<ObjRef>,
    pub target: Option<ObjRef>,
}

impl Macro {
    pub(crate) fn read(d: &mut Decoder) -> Result<Self> {
        d.reader.skip(12)?;

        let text = d.reader.read_string()?;

        d.reader.read_u32()?;
        d.reader.read_u32()?;
        let state_size = match d.version()? {
            Version::Legacy => 120,
            Version::Modern => 480,
        };
        d.reader.skip(state_size)?;

        let owner = d.resolve(Required::Object)?;
        let from = d.resolve(Required::Object)?;
        let zero = d.reader.read_u16()?;
        if zero != 0 {
            return Err(Error::MalformedRecord("non-zero macro pad".into()));
        }
        let target = d.resolve(Required::Object)?;

        d.reader.skip(18)?;
        if d.version()?.is_modern() {
            d.reader.skip(16)?;
        }

        Ok(Macro {
            text,
            owner,
            from,
            target,
        })
    }
}
