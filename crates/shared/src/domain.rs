use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(SongId);
id_newtype!(OwnerId);
id_newtype!(LicenseId);
id_newtype!(LicenseeId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    pub owner_id: OwnerId,
    pub year: u32,
    pub genre: String,
    pub price: u32,
}

/// Full owner record. `auth_key` gates license approval and revocation, so
/// only the creation response carries it; lookups return [`OwnerSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    pub email: String,
    pub auth_key: String,
    pub song_ids: Vec<SongId>,
    pub license_ids: Vec<LicenseId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub id: OwnerId,
    pub name: String,
    pub email: String,
}

impl From<Owner> for OwnerSummary {
    fn from(owner: Owner) -> Self {
        Self {
            id: owner.id,
            name: owner.name,
            email: owner.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Licensee {
    pub id: LicenseeId,
    pub name: String,
    pub email: String,
    /// Approved licenses held by this licensee.
    pub licenses: Vec<LicenseId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub id: LicenseId,
    pub song_id: SongId,
    pub owner_id: OwnerId,
    pub licensee_id: LicenseeId,
    pub approved: bool,
    pub price: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}
