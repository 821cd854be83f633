// Detector domain model and the channel-address identity codec
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bit-field widths of the packed detector id: the low 8 bits carry the
/// channel, the next 8 the address, and the remaining high bits the line.
const ADDRESS_SHIFT: u32 = 8;
const LINE_SHIFT: u32 = 16;
const FIELD_MASK: u32 = 0xff;
const LINE_MAX: u32 = u32::MAX >> LINE_SHIFT;

/// A triple out of range for the packed id layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("channel address out of range: line={line} address={address} channel={channel} (line <= 65535, address/channel <= 255)")]
pub struct InvalidIdentity {
    pub line: u32,
    pub address: u32,
    pub channel: u32,
}

/// The controller's three-level addressing of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelAddress {
    pub line: u32,
    pub address: u32,
    pub channel: u32,
}

impl ChannelAddress {
    pub fn new(line: u32, address: u32, channel: u32) -> Self {
        Self {
            line,
            address,
            channel,
        }
    }
}

/// Packed 32-bit detector identifier, a deterministic injective function of
/// the channel address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectorId(pub u32);

impl DetectorId {
    /// Pack a channel address into a detector id. Fails when any field
    /// exceeds its bit-field capacity.
    pub fn encode(addr: ChannelAddress) -> Result<Self, InvalidIdentity> {
        if addr.address > FIELD_MASK || addr.channel > FIELD_MASK || addr.line > LINE_MAX {
            return Err(InvalidIdentity {
                line: addr.line,
                address: addr.address,
                channel: addr.channel,
            });
        }
        Ok(Self(
            addr.line << LINE_SHIFT | addr.address << ADDRESS_SHIFT | addr.channel,
        ))
    }

    /// Exact inverse of [`DetectorId::encode`].
    pub fn decode(self) -> ChannelAddress {
        ChannelAddress {
            line: self.0 >> LINE_SHIFT,
            address: self.0 >> ADDRESS_SHIFT & FIELD_MASK,
            channel: self.0 & FIELD_MASK,
        }
    }
}

impl std::fmt::Display for DetectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A physical measurement channel with its human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detector {
    pub id: DetectorId,
    pub name: String,
    pub line: u32,
    pub address: u32,
    pub channel: u32,
}

impl Detector {
    /// Build a detector record from a configured address and name.
    pub fn from_address(addr: ChannelAddress, name: String) -> Result<Self, InvalidIdentity> {
        let id = DetectorId::encode(addr)?;
        Ok(Self {
            id,
            name,
            line: addr.line,
            address: addr.address,
            channel: addr.channel,
        })
    }
}
