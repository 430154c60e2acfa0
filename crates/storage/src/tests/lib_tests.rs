use super::*;
use chrono::TimeZone;

async fn seeded() -> (Storage, OwnerId, SongId, LicenseeId) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let owner = storage
        .create_owner("alice", "alice@example.com", "alice-key")
        .await
        .expect("owner");
    let song = storage
        .create_song(&NewSong {
            title: "Blue Hour",
            artist: "Alice",
            owner_id: owner,
            year: 2021,
            genre: "ambient",
            price: 150,
        })
        .await
        .expect("song");
    let licensee = storage
        .create_licensee("bob", "bob@example.com")
        .await
        .expect("licensee");
    (storage, owner, song, licensee)
}

fn new_license(song_id: SongId, owner_id: OwnerId, licensee_id: LicenseeId) -> NewLicense {
    NewLicense {
        song_id,
        owner_id,
        licensee_id,
        price: 150,
        start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("music_licensing_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn loads_song_and_lists_in_insertion_order() {
    let (storage, owner, first, _) = seeded().await;
    let second = storage
        .create_song(&NewSong {
            title: "Second Light",
            artist: "Alice",
            owner_id: owner,
            year: 2023,
            genre: "folk",
            price: 90,
        })
        .await
        .expect("song");

    let song = storage.load_song(first).await.expect("load").expect("song");
    assert_eq!(song.title, "Blue Hour");
    assert_eq!(song.year, 2021);
    assert_eq!(song.price, 150);

    let ids: Vec<SongId> = storage
        .list_songs()
        .await
        .expect("list")
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ids, vec![first, second]);
}

#[tokio::test]
async fn missing_rows_load_as_none() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.load_song(SongId(42)).await.expect("song").is_none());
    assert!(storage.load_owner(OwnerId(42)).await.expect("owner").is_none());
    assert!(storage
        .load_licensee(LicenseeId(42))
        .await
        .expect("licensee")
        .is_none());
    assert!(storage
        .load_license(LicenseId(42))
        .await
        .expect("license")
        .is_none());
}

#[tokio::test]
async fn owner_lists_songs_and_only_approved_licenses() {
    let (storage, owner, song, licensee) = seeded().await;
    let pending = storage
        .create_license(&new_license(song, owner, licensee))
        .await
        .expect("pending");
    let approved = storage
        .create_license(&new_license(song, owner, licensee))
        .await
        .expect("approved");
    assert!(storage
        .set_license_approved(approved, true)
        .await
        .expect("approve"));

    let loaded = storage.load_owner(owner).await.expect("load").expect("owner");
    assert_eq!(loaded.song_ids, vec![song]);
    assert_eq!(loaded.license_ids, vec![approved]);
    assert_eq!(loaded.auth_key, "alice-key");

    let holder = storage
        .load_licensee(licensee)
        .await
        .expect("load")
        .expect("licensee");
    assert_eq!(holder.licenses, vec![approved]);

    let requests = storage
        .list_licenses_for_owner(owner)
        .await
        .expect("requests");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].id, pending);
    assert!(!requests[0].approved);
}

#[tokio::test]
async fn license_times_round_trip_through_sqlite() {
    let (storage, owner, song, licensee) = seeded().await;
    let request = new_license(song, owner, licensee);
    let id = storage.create_license(&request).await.expect("license");
    let license = storage.load_license(id).await.expect("load").expect("license");
    assert_eq!(license.start_time, request.start_time);
    assert_eq!(license.end_time, request.end_time);
    assert_eq!(license.licensee_id, licensee);
}

#[tokio::test]
async fn set_license_approved_reports_missing_row() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let updated = storage
        .set_license_approved(LicenseId(7), true)
        .await
        .expect("update");
    assert!(!updated);
}

#[tokio::test]
async fn approval_flag_only_flips_from_the_opposite_state() {
    let (storage, owner, song, licensee) = seeded().await;
    let id = storage
        .create_license(&new_license(song, owner, licensee))
        .await
        .expect("license");

    assert!(!storage.set_license_approved(id, false).await.expect("revoke pending"));
    assert!(storage.set_license_approved(id, true).await.expect("approve"));
    assert!(!storage.set_license_approved(id, true).await.expect("approve again"));
    assert!(storage.set_license_approved(id, false).await.expect("revoke"));
    assert!(!storage.set_license_approved(id, false).await.expect("revoke again"));
}

#[test]
fn parent_dir_is_created_only_for_file_urls() {
    let root = std::env::temp_dir().join(format!("music_licensing_storage_{}", std::process::id()));
    let url = format!("sqlite://{}/nested/test.db", root.display());

    ensure_sqlite_parent_dir_exists(&url).expect("create parent");
    assert!(root.join("nested").is_dir());
    ensure_sqlite_parent_dir_exists("sqlite::memory:").expect("memory");

    std::fs::remove_dir_all(root).expect("cleanup");
}
