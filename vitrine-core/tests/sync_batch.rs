//! End-to-end batch behavior against fake provider/transport boundaries.

mod support;

use std::sync::Arc;
use std::time::Duration;

use support::{FakeProvider, FakeTransport, ok_bytes, tiny_jpeg};
use tempfile::tempdir;
use url::Url;

use vitrine_core::{
    AssetCacheStore, Config, CoreError, LibrarySession, StoreItem, SyncState,
    TitleInfo,
};
use vitrine_model::{AssetCacheRecord, AssetType, TitleChange, TitleId};

fn icon_url(id: TitleId) -> Url {
    Url::parse(&format!("https://assets.test/{}/icon.jpg", id.raw())).unwrap()
}

fn hero_url(id: TitleId) -> Url {
    Url::parse(&format!("https://assets.test/{}/hero.jpg", id.raw())).unwrap()
}

fn portrait_url(id: TitleId) -> Url {
    Url::parse(&format!("https://assets.test/{}/portrait.jpg", id.raw()))
        .unwrap()
}

async fn run_sync(session: &LibrarySession) {
    session.start_sync().await.unwrap();
    session.wait_for_sync().await;
}

#[tokio::test]
async fn matching_icon_hash_is_a_cache_hit() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());
    config.ensure_directories().unwrap();

    let id = TitleId::app(1);
    let info = TitleInfo {
        name: "Title A".to_string(),
        icon_hash: "abc".to_string(),
        icon_url: Some(icon_url(id)),
        ..TitleInfo::default()
    };

    // Seed the snapshot and the cached file before logon.
    let store = AssetCacheStore::new(config.assets_dir());
    store.view().insert(
        id,
        AssetCacheRecord {
            icon_hash: "abc".to_string(),
            ..AssetCacheRecord::default()
        },
    );
    store.save().await.unwrap();
    std::fs::write(store.asset_path(id, AssetType::Icon), b"cached icon")
        .unwrap();

    let provider = Arc::new(FakeProvider::new().with_title(id, info));
    let transport = Arc::new(FakeTransport::new());
    let session =
        LibrarySession::logon(config, provider, transport.clone())
            .await
            .unwrap();

    run_sync(&session).await;

    assert_eq!(transport.request_count(), 0);
    assert_eq!(
        session.local_asset_path(id, AssetType::Icon),
        Some(session.store().asset_path(id, AssetType::Icon))
    );
}

#[tokio::test]
async fn empty_cached_hash_downloads_exactly_one_icon() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());

    let id = TitleId::app(2);
    let info = TitleInfo {
        name: "Title B".to_string(),
        icon_hash: "xyz".to_string(),
        icon_url: Some(icon_url(id)),
        ..TitleInfo::default()
    };

    let provider = Arc::new(FakeProvider::new().with_title(id, info));
    let transport = Arc::new(
        FakeTransport::new()
            .respond(&icon_url(id), ok_bytes(b"icon bytes".to_vec())),
    );
    let session =
        LibrarySession::logon(config, provider, transport.clone())
            .await
            .unwrap();
    let mut events = session.subscribe();

    run_sync(&session).await;

    assert_eq!(transport.request_count(), 1);
    let record = session.store().record(id).unwrap();
    assert_eq!(record.icon_hash, "xyz");

    let path = session.local_asset_path(id, AssetType::Icon).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"icon bytes");

    let mut cached_icon = false;
    while let Ok(event) = events.try_recv() {
        if event.title_id == id
            && event.change == TitleChange::AssetCached(AssetType::Icon)
        {
            cached_icon = true;
        }
    }
    assert!(cached_icon);
}

#[tokio::test]
async fn fresh_expiry_and_current_store_timestamp_skip_the_network() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());
    config.ensure_directories().unwrap();

    let id = TitleId::app(3);
    let info = TitleInfo {
        name: "Title".to_string(),
        assets_last_modified: 100,
        hero_url: Some(hero_url(id)),
        ..TitleInfo::default()
    };

    let store = AssetCacheStore::new(config.assets_dir());
    let far_future = chrono::Utc::now().timestamp() + 3_600;
    let mut record = AssetCacheRecord {
        store_assets_last_modified: 100,
        ..AssetCacheRecord::default()
    };
    record.set_expires(AssetType::Hero, far_future);
    store.view().insert(id, record);
    store.save().await.unwrap();
    std::fs::write(store.asset_path(id, AssetType::Hero), b"cached hero")
        .unwrap();

    let provider = Arc::new(FakeProvider::new().with_title(id, info));
    let transport = Arc::new(FakeTransport::new());
    let session =
        LibrarySession::logon(config, provider, transport.clone())
            .await
            .unwrap();

    run_sync(&session).await;

    assert_eq!(transport.request_count(), 0);
    assert!(session.local_asset_path(id, AssetType::Hero).is_some());
}

#[tokio::test]
async fn successful_download_records_response_headers() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());

    let id = TitleId::app(4);
    let info = TitleInfo {
        name: "Title".to_string(),
        assets_last_modified: 100,
        hero_url: Some(hero_url(id)),
        ..TitleInfo::default()
    };

    let provider = Arc::new(FakeProvider::new().with_title(id, info));
    let transport = Arc::new(
        FakeTransport::new()
            .respond(&hero_url(id), ok_bytes(b"hero bytes".to_vec())),
    );
    let session =
        LibrarySession::logon(config, provider, transport.clone())
            .await
            .unwrap();

    run_sync(&session).await;

    let record = session.store().record(id).unwrap();
    assert_eq!(
        record.last_modified_for(AssetType::Hero),
        "Tue, 15 Nov 1994 08:12:31 GMT"
    );
    // The canned Expires header, as unix seconds.
    assert_eq!(record.expires_for(AssetType::Hero), 816_423_151);
    assert_eq!(record.store_assets_last_modified, 100);

    let path = session.local_asset_path(id, AssetType::Hero).unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn not_found_assets_are_generated_from_the_store_catalog() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());
    let cdn = config.cdn_base_url.clone();

    let id = TitleId::app(5);
    let info = TitleInfo {
        name: "Title C".to_string(),
        assets_last_modified: 100,
        hero_url: Some(hero_url(id)),
        portrait_url: Some(portrait_url(id)),
        ..TitleInfo::default()
    };
    let item = StoreItem {
        title_id: id,
        available: true,
        screenshot_filenames: vec![
            "shots/a.jpg".to_string(),
            "shots/b.jpg".to_string(),
        ],
        header_path: Some("headers/5.jpg".to_string()),
    };

    let provider = Arc::new(
        FakeProvider::new().with_title(id, info).with_store_item(item),
    );
    // Remote hero/portrait 404; the CDN serves the screenshot and header.
    let transport = Arc::new(
        FakeTransport::new()
            .respond(&cdn.join("shots/b.jpg").unwrap(), ok_bytes(tiny_jpeg()))
            .respond(
                &cdn.join("headers/5.jpg").unwrap(),
                ok_bytes(tiny_jpeg()),
            ),
    );
    let session =
        LibrarySession::logon(config, provider.clone(), transport.clone())
            .await
            .unwrap();

    run_sync(&session).await;

    // Hero and portrait both 404'd for one title: one merged request.
    let queries = provider.store_queries.lock().unwrap().clone();
    assert_eq!(queries, vec![vec![id]]);

    // The provisional horizon is written so the title is not re-queried
    // every session.
    let record = session.store().record(id).unwrap();
    let now = chrono::Utc::now().timestamp();
    const YEAR: i64 = 365 * 24 * 3_600;
    for asset_type in [AssetType::Hero, AssetType::Portrait] {
        let expires = record.expires_for(asset_type);
        assert!(expires > now + 4 * YEAR && expires < now + 6 * YEAR);
        assert!(!record.last_modified_for(asset_type).is_empty());
    }

    // Reverse-alphabetical pick: b.jpg, not a.jpg.
    let requested = transport.requests.lock().unwrap().clone();
    assert!(requested.contains(&cdn.join("shots/b.jpg").unwrap()));
    assert!(!requested.contains(&cdn.join("shots/a.jpg").unwrap()));

    let hero = image::open(
        session.store().asset_path(id, AssetType::Hero),
    )
    .unwrap();
    assert_eq!((hero.width(), hero.height()), (1024, 550));

    let portrait = image::open(
        session.store().asset_path(id, AssetType::Portrait),
    )
    .unwrap();
    assert_eq!((portrait.width(), portrait.height()), (600, 900));
}

#[tokio::test(flavor = "multi_thread")]
async fn fifty_titles_never_exceed_thirty_concurrent_tasks() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());

    let mut provider = FakeProvider::new();
    let mut transport =
        FakeTransport::new().with_delay(Duration::from_millis(20));
    let ids: Vec<TitleId> = (1..=50).map(TitleId::app).collect();
    for &id in &ids {
        let info = TitleInfo {
            name: format!("Title {}", id.raw()),
            icon_hash: format!("hash-{}", id.raw()),
            icon_url: Some(icon_url(id)),
            ..TitleInfo::default()
        };
        provider = provider.with_title(id, info);
        transport = transport
            .respond(&icon_url(id), ok_bytes(b"icon".to_vec()));
    }

    let transport = Arc::new(transport);
    let session = LibrarySession::logon(
        config,
        Arc::new(provider),
        transport.clone(),
    )
    .await
    .unwrap();

    run_sync(&session).await;

    assert_eq!(transport.request_count(), 50);
    assert!(
        transport
            .max_in_flight
            .load(std::sync::atomic::Ordering::SeqCst)
            <= 30
    );
    for &id in &ids {
        assert!(session.local_asset_path(id, AssetType::Icon).is_some());
        assert_eq!(
            session.store().record(id).unwrap().icon_hash,
            format!("hash-{}", id.raw())
        );
    }
}

#[tokio::test]
async fn second_start_while_running_is_a_busy_error() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());

    let id = TitleId::app(8);
    let info = TitleInfo {
        name: "Title".to_string(),
        icon_hash: "slow".to_string(),
        icon_url: Some(icon_url(id)),
        ..TitleInfo::default()
    };
    let provider = Arc::new(FakeProvider::new().with_title(id, info));
    let transport = Arc::new(
        FakeTransport::new()
            .with_delay(Duration::from_millis(100))
            .respond(&icon_url(id), ok_bytes(b"icon".to_vec())),
    );
    let session = LibrarySession::logon(config, provider, transport)
        .await
        .unwrap();

    assert_eq!(session.sync_state().await, SyncState::Idle);
    session.start_sync().await.unwrap();
    assert!(matches!(
        session.start_sync().await,
        Err(CoreError::SyncInProgress)
    ));

    session.wait_for_sync().await;
    assert_eq!(session.sync_state().await, SyncState::Complete);

    // A completed session may re-sync.
    session.start_sync().await.unwrap();
    session.logoff().await.unwrap();
}

#[tokio::test]
async fn logoff_persists_the_snapshot() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());
    let assets_dir = config.assets_dir();

    let id = TitleId::app(9);
    let info = TitleInfo {
        name: "Title".to_string(),
        icon_hash: "deadbeef".to_string(),
        icon_url: Some(icon_url(id)),
        ..TitleInfo::default()
    };
    let provider = Arc::new(FakeProvider::new().with_title(id, info));
    let transport = Arc::new(
        FakeTransport::new()
            .respond(&icon_url(id), ok_bytes(b"icon".to_vec())),
    );
    let session = LibrarySession::logon(config, provider, transport)
        .await
        .unwrap();

    session.start_sync().await.unwrap();
    // Logoff waits for the in-flight batch before persisting.
    session.logoff().await.unwrap();

    let store = AssetCacheStore::new(assets_dir);
    let view = store.load().await;
    assert_eq!(view.get(&id).unwrap().icon_hash, "deadbeef");
}

#[tokio::test]
async fn file_locators_are_adopted_without_network_access() {
    let dir = tempdir().unwrap();
    let config = Config::for_cache_root(dir.path());

    let id = TitleId::shortcut(1);
    let info = TitleInfo {
        name: "My Shortcut".to_string(),
        icon_url: Some(Url::parse("file:///home/user/art/icon.png").unwrap()),
        ..TitleInfo::default()
    };
    let provider = Arc::new(FakeProvider::new().with_title(id, info));
    let transport = Arc::new(FakeTransport::new());
    let session =
        LibrarySession::logon(config, provider, transport.clone())
            .await
            .unwrap();

    run_sync(&session).await;

    assert_eq!(transport.request_count(), 0);
    assert_eq!(
        session.local_asset_path(id, AssetType::Icon),
        Some("/home/user/art/icon.png".into())
    );
    // The adopted file itself never enters the cache record.
    assert_eq!(
        session.store().record(id).unwrap(),
        AssetCacheRecord::default()
    );
}
