// ABOUTME: Defines the fixed set of entity collections and the two store sides.
// ABOUTME: Collection names are camelCase on the wire and double as store file stems.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a collection name does not match any known collection.
#[derive(Debug, Clone, Error)]
#[error("unknown collection: {0}")]
pub struct UnknownCollection(pub String);

/// A named category of entity records. The set is closed: requests naming
/// anything else are rejected before they reach storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Agents,
    SoundEngines,
    Bumbos,
    DriveDisks,
    HsrCharacters,
    HsrCones,
    HsrRelics,
}

impl Collection {
    /// Every collection, in the order operations walk them.
    pub const ALL: [Collection; 7] = [
        Collection::Agents,
        Collection::SoundEngines,
        Collection::Bumbos,
        Collection::DriveDisks,
        Collection::HsrCharacters,
        Collection::HsrCones,
        Collection::HsrRelics,
    ];

    /// The wire name, also used as the store file stem.
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Agents => "agents",
            Collection::SoundEngines => "soundEngines",
            Collection::Bumbos => "bumbos",
            Collection::DriveDisks => "driveDisks",
            Collection::HsrCharacters => "hsrCharacters",
            Collection::HsrCones => "hsrCones",
            Collection::HsrRelics => "hsrRelics",
        }
    }

    /// All wire names, for error messages listing the valid choices.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCollection(s.to_string()))
    }
}

/// Which copy of a collection a store document belongs to: the published
/// copy the public site reads, or the admin's draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Web,
    Admin,
}

impl Side {
    /// Directory name under the storage root.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Web => "web",
            Side::Admin => "admin",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
