use shared::{
    domain::{License, LicenseId, Licensee, LicenseeId, Owner, OwnerId, OwnerSummary, Song, SongId},
    error::{ApiError, ErrorCode},
    protocol::{LicensePayload, LicenseePayload, OwnerPayload, SongPayload},
};
use storage::{NewLicense, NewSong, Storage};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub fn greet(name: &str) -> String {
    format!("Hello, {name}!")
}

pub async fn get_all_songs(ctx: &ApiContext) -> Result<Vec<Song>, ApiError> {
    let songs = ctx.storage.list_songs().await.map_err(internal)?;
    if songs.is_empty() {
        return Err(ApiError::not_found("no songs licensable could be found"));
    }
    Ok(songs)
}

pub async fn get_song(ctx: &ApiContext, song_id: SongId) -> Result<Song, ApiError> {
    load_song(ctx, song_id).await
}

pub async fn create_song(ctx: &ApiContext, payload: SongPayload) -> Result<Song, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::invalid_payload("song title must not be empty"));
    }
    load_owner(ctx, payload.owner_id).await?;

    let song_id = ctx
        .storage
        .create_song(&NewSong {
            title: &payload.title,
            artist: &payload.artist,
            owner_id: payload.owner_id,
            year: payload.year,
            genre: &payload.genre,
            price: payload.price,
        })
        .await
        .map_err(internal)?;
    info!(song_id = song_id.0, owner_id = payload.owner_id.0, "song created");

    Ok(Song {
        id: song_id,
        title: payload.title,
        artist: payload.artist,
        owner_id: payload.owner_id,
        year: payload.year,
        genre: payload.genre,
        price: payload.price,
    })
}

pub async fn get_song_owner(ctx: &ApiContext, song_id: SongId) -> Result<OwnerSummary, ApiError> {
    let song = load_song(ctx, song_id).await?;
    let owner = load_owner(ctx, song.owner_id).await?;
    Ok(owner.into())
}

pub async fn create_owner(ctx: &ApiContext, payload: OwnerPayload) -> Result<Owner, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::invalid_payload("owner name must not be empty"));
    }
    if payload.auth_key.trim().is_empty() {
        return Err(ApiError::invalid_payload("owner auth key must not be empty"));
    }

    let owner_id = ctx
        .storage
        .create_owner(&payload.name, &payload.email, &payload.auth_key)
        .await
        .map_err(internal)?;
    info!(owner_id = owner_id.0, "owner created");

    Ok(Owner {
        id: owner_id,
        name: payload.name,
        email: payload.email,
        auth_key: payload.auth_key,
        song_ids: Vec::new(),
        license_ids: Vec::new(),
    })
}

pub async fn create_licensee(
    ctx: &ApiContext,
    payload: LicenseePayload,
) -> Result<Licensee, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::invalid_payload("licensee name must not be empty"));
    }

    let licensee_id = ctx
        .storage
        .create_licensee(&payload.name, &payload.email)
        .await
        .map_err(internal)?;
    info!(licensee_id = licensee_id.0, "licensee created");

    Ok(Licensee {
        id: licensee_id,
        name: payload.name,
        email: payload.email,
        licenses: Vec::new(),
    })
}

pub async fn get_licensee(ctx: &ApiContext, licensee_id: LicenseeId) -> Result<Licensee, ApiError> {
    load_licensee(ctx, licensee_id).await
}

pub async fn create_license_request(
    ctx: &ApiContext,
    payload: LicensePayload,
) -> Result<License, ApiError> {
    if payload.end_time < payload.start_time {
        return Err(ApiError::invalid_payload(
            "license end time must not precede its start time",
        ));
    }
    let song = load_song(ctx, payload.song_id).await?;
    load_licensee(ctx, payload.licensee_id).await?;

    let request = NewLicense {
        song_id: song.id,
        owner_id: song.owner_id,
        licensee_id: payload.licensee_id,
        price: payload.price,
        start_time: payload.start_time,
        end_time: payload.end_time,
    };
    let license_id = ctx
        .storage
        .create_license(&request)
        .await
        .map_err(internal)?;
    info!(
        license_id = license_id.0,
        song_id = song.id.0,
        licensee_id = payload.licensee_id.0,
        "license requested"
    );

    Ok(License {
        id: license_id,
        song_id: request.song_id,
        owner_id: request.owner_id,
        licensee_id: request.licensee_id,
        approved: false,
        price: request.price,
        start_time: request.start_time,
        end_time: request.end_time,
    })
}

pub async fn get_license(ctx: &ApiContext, license_id: LicenseId) -> Result<License, ApiError> {
    load_license(ctx, license_id).await
}

pub async fn get_owner_license_requests(
    ctx: &ApiContext,
    owner_id: OwnerId,
) -> Result<Vec<License>, ApiError> {
    let licenses = ctx
        .storage
        .list_licenses_for_owner(owner_id)
        .await
        .map_err(internal)?;
    if licenses.is_empty() {
        return Err(ApiError::not_found(format!(
            "no licenses could be found for owner id:{owner_id}"
        )));
    }
    Ok(licenses)
}

pub async fn get_licensee_licenses(
    ctx: &ApiContext,
    licensee_id: LicenseeId,
) -> Result<Vec<License>, ApiError> {
    let licenses = ctx
        .storage
        .list_licenses_for_licensee(licensee_id)
        .await
        .map_err(internal)?;
    if licenses.is_empty() {
        return Err(ApiError::not_found(format!(
            "no licenses could be found for licensee id:{licensee_id}"
        )));
    }
    Ok(licenses)
}

pub async fn approve_license(
    ctx: &ApiContext,
    license_id: LicenseId,
    auth_key: &str,
) -> Result<License, ApiError> {
    let license = load_license(ctx, license_id).await?;
    ensure_owner_key(ctx, &license, auth_key, "approve").await?;

    if license.approved {
        return Err(already_approved(license_id));
    }
    load_licensee(ctx, license.licensee_id).await?;

    if !flip_approval(ctx, license_id, true).await? {
        return Err(already_approved(license_id));
    }
    info!(license_id = license_id.0, "license approved");
    Ok(License {
        approved: true,
        ..license
    })
}

pub async fn revoke_license(
    ctx: &ApiContext,
    license_id: LicenseId,
    auth_key: &str,
) -> Result<License, ApiError> {
    let license = load_license(ctx, license_id).await?;
    ensure_owner_key(ctx, &license, auth_key, "revoke").await?;

    // Only approved licenses appear in the owner's and licensee's license lists.
    if !license.approved || !flip_approval(ctx, license_id, false).await? {
        return Err(ApiError::not_found(format!(
            "license id:{license_id} could not be found in owner id:{}",
            license.owner_id
        )));
    }

    info!(license_id = license_id.0, "license revoked");
    Ok(License {
        approved: false,
        ..license
    })
}

async fn ensure_owner_key(
    ctx: &ApiContext,
    license: &License,
    auth_key: &str,
    action: &str,
) -> Result<(), ApiError> {
    let owner = load_owner(ctx, license.owner_id).await?;
    if owner.auth_key != auth_key {
        warn!(
            license_id = license.id.0,
            owner_id = owner.id.0,
            action,
            "rejected license change with invalid auth key"
        );
        return Err(ApiError::invalid_payload(format!(
            "auth key is invalid, only the song owner can {action}"
        )));
    }
    Ok(())
}

/// Returns `false` when a concurrent request already moved the flag.
async fn flip_approval(ctx: &ApiContext, license_id: LicenseId, approved: bool) -> Result<bool, ApiError> {
    ctx.storage
        .set_license_approved(license_id, approved)
        .await
        .map_err(internal)
}

fn already_approved(license_id: LicenseId) -> ApiError {
    ApiError::new(
        ErrorCode::AlreadyApproved,
        format!("license id:{license_id} has already been approved"),
    )
}

async fn load_song(ctx: &ApiContext, song_id: SongId) -> Result<Song, ApiError> {
    ctx.storage
        .load_song(song_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("song id:{song_id} could not be found")))
}

async fn load_owner(ctx: &ApiContext, owner_id: OwnerId) -> Result<Owner, ApiError> {
    ctx.storage
        .load_owner(owner_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("owner id:{owner_id} could not be found")))
}

async fn load_licensee(ctx: &ApiContext, licensee_id: LicenseeId) -> Result<Licensee, ApiError> {
    ctx.storage
        .load_licensee(licensee_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            ApiError::not_found(format!("licensee id:{licensee_id} could not be found"))
        })
}

async fn load_license(ctx: &ApiContext, license_id: LicenseId) -> Result<License, ApiError> {
    ctx.storage
        .load_license(license_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("license id:{license_id} could not be found")))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
