use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{LicenseeId, OwnerId, SongId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetResponse {
    pub greeting: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongPayload {
    pub title: String,
    pub artist: String,
    pub owner_id: OwnerId,
    pub year: u32,
    pub genre: String,
    pub price: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerPayload {
    pub name: String,
    pub email: String,
    pub auth_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseePayload {
    pub name: String,
    pub email: String,
}

/// License request. The owner is taken from the song, not from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicensePayload {
    pub song_id: SongId,
    pub licensee_id: LicenseeId,
    pub price: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Proof of ownership for approve/revoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedPayload {
    pub auth_key: String,
}
