//! Tests for `Repository` against a scripted backend.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::{repository, repository_with_ttl, server_error, ScriptedTransport};
use petadmin_client::api_client::Method;
use petadmin_shared::{ApiError, DomainRecord, Rarity, ResourceKind, Tag};
use serde_json::json;

fn pets_v1() -> serde_json::Value {
    json!([
        { "id": 1, "name": "Lửa", "type": "dragon", "rarity": "epic", "level": 12 },
        { "id": 2, "name": "Mây", "type": "cat", "rarity": "common", "level": 3 }
    ])
}

// ---------------------------------------------------------------------------
// Test: list responses are normalized and cached
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_is_normalized_and_cached() {
    let backend = ScriptedTransport::new();
    backend.reply(Method::GET, "/pets", Ok(json!({ "data": pets_v1() })));
    let repo = repository(&backend);

    let pets = repo.pets().await.unwrap();
    assert_eq!(pets.len(), 2);
    assert_eq!(pets[0].rarity, Tag::Known(Rarity::Epic));
    assert_eq!(pets[1].max_hp, 100);

    repo.pets().await.unwrap();
    assert_eq!(backend.count(Method::GET, "/pets"), 1);
}

// ---------------------------------------------------------------------------
// Test: a successful update invalidates the kind and the next read refetches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_invalidates_and_next_read_sees_new_data() {
    let backend = ScriptedTransport::new();
    backend.reply(Method::GET, "/pets", Ok(pets_v1()));
    backend.reply(
        Method::GET,
        "/pets",
        Ok(json!([
            { "id": 1, "name": "Lửa", "type": "dragon", "rarity": "epic", "level": 13 },
            { "id": 2, "name": "Mây", "type": "cat", "rarity": "common", "level": 3 }
        ])),
    );
    backend.reply(
        Method::PUT,
        "/pets/1",
        Ok(json!({ "id": 1, "name": "Lửa", "type": "dragon", "rarity": "epic", "level": 13 })),
    );
    let repo = repository(&backend);

    assert_eq!(repo.pets().await.unwrap()[0].level, 12);

    let updated = repo.update_pet(1, json!({ "level": 13 })).await.unwrap();
    assert_eq!(updated.level, 13);
    assert_eq!(backend.last_body(Method::PUT, "/pets/1"), Some(json!({ "level": 13 })));

    assert_eq!(repo.pets().await.unwrap()[0].level, 13);
    assert_eq!(backend.count(Method::GET, "/pets"), 2);
}

// ---------------------------------------------------------------------------
// Test: a failed mutation leaves the cache alone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_mutation_does_not_invalidate() {
    let backend = ScriptedTransport::new();
    backend.reply(Method::GET, "/pets", Ok(pets_v1()));
    backend.reply(Method::DELETE, "/pets/2", Err(server_error()));
    let repo = repository(&backend);

    repo.pets().await.unwrap();
    let err = repo.delete(ResourceKind::Pets, 2).await.unwrap_err();
    assert_eq!(err.to_string(), "Internal error");
    assert_eq!(err.status(), Some(500));

    repo.pets().await.unwrap();
    assert_eq!(backend.count(Method::GET, "/pets"), 1);
}

// ---------------------------------------------------------------------------
// Test: a failed refetch keeps the last good data visible, with the error
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_refetch_serves_last_known_data() {
    let ttl = Duration::from_secs(60);
    let backend = ScriptedTransport::new();
    backend.reply(Method::GET, "/items", Ok(json!([{ "id": 1, "name": "Táo", "itemType": "FOOD" }])));
    backend.reply(Method::GET, "/items", Err(ApiError::Timeout("30s".into())));
    let repo = repository_with_ttl(&backend, ttl);

    let first = repo.read(ResourceKind::Items).await;
    assert!(first.error.is_none());

    tokio::time::advance(ttl + Duration::from_secs(1)).await;

    let second = repo.read(ResourceKind::Items).await;
    assert!(second.is_stale());
    assert_matches!(second.error, Some(ApiError::Timeout(_)));
    let items = second.data.unwrap().items();
    assert_eq!(items[0].name, "Táo");
    assert_eq!(backend.count(Method::GET, "/items"), 2);
}

// ---------------------------------------------------------------------------
// Test: a failed first read has nothing to fall back on
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_first_read_has_no_data() {
    let backend = ScriptedTransport::new();
    backend.reply(Method::GET, "/players", Err(server_error()));
    let repo = repository(&backend);

    let outcome = repo.read(ResourceKind::Players).await;
    assert!(outcome.data.is_none());
    assert!(!outcome.is_stale());
    assert_eq!(outcome.error.and_then(|e| e.status()), Some(500));
}

// ---------------------------------------------------------------------------
// Test: a missing route surfaces as a 404 naming the endpoint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_route_names_endpoint() {
    let backend = ScriptedTransport::new();
    let repo = repository(&backend);

    let err = repo.list(ResourceKind::Shops).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Endpoint not found: /shop");
}

// ---------------------------------------------------------------------------
// Test: single-record reads unwrap the data envelope and are cached
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_unwraps_envelope() {
    let backend = ScriptedTransport::new();
    backend.reply(
        Method::GET,
        "/players/4",
        Ok(json!({ "data": { "id": 4, "username": "hoa", "coins": 120, "isBanned": true } })),
    );
    let repo = repository(&backend);

    let record = repo.get(ResourceKind::Players, 4).await.unwrap();
    let player = record.as_player().unwrap();
    assert_eq!(player.username, "hoa");
    assert_eq!(player.balances.coin, 120);
    assert_eq!(player.status.as_str(), "banned");

    repo.get(ResourceKind::Players, 4).await.unwrap();
    assert_eq!(backend.count(Method::GET, "/players/4"), 1);
}

// ---------------------------------------------------------------------------
// Test: ban/unban are player mutations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ban_invalidates_players_only() {
    let backend = ScriptedTransport::new();
    backend.reply(Method::GET, "/players", Ok(json!([{ "id": 4, "username": "hoa" }])));
    backend.reply(Method::GET, "/pets", Ok(pets_v1()));
    backend.reply(Method::PUT, "/players/4/ban", Ok(json!(null)));
    let repo = repository(&backend);

    repo.players().await.unwrap();
    repo.pets().await.unwrap();
    repo.ban_player(4).await.unwrap();
    repo.players().await.unwrap();
    repo.pets().await.unwrap();

    assert_eq!(backend.count(Method::PUT, "/players/4/ban"), 1);
    assert_eq!(backend.count(Method::GET, "/players"), 2);
    assert_eq!(backend.count(Method::GET, "/pets"), 1);
}

// ---------------------------------------------------------------------------
// Test: create returns the normalized record
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_normalized_record() {
    let backend = ScriptedTransport::new();
    backend.reply(
        Method::POST,
        "/items",
        Ok(json!({ "id": 9, "name": "Bánh", "itemType": "FOOD", "price": null })),
    );
    let repo = repository(&backend);

    let created = repo
        .create(ResourceKind::Items, json!({ "name": "Bánh", "itemType": "FOOD" }))
        .await
        .unwrap();
    assert_matches!(&created, DomainRecord::Item(item) if item.price == 0 && item.category.as_str() == "food");
}

// ---------------------------------------------------------------------------
// Test: server-side search hits the encoded search route
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_uses_encoded_route() {
    let backend = ScriptedTransport::new();
    backend.reply(
        Method::GET,
        "/pets/search?keyword=r%E1%BB%93ng&page=0&size=10",
        Ok(json!({ "content": [{ "id": 1, "name": "Rồng" }], "totalElements": 1, "totalPages": 1, "size": 10, "number": 0 })),
    );
    let repo = repository(&backend);

    let listing = repo.search(ResourceKind::Pets, "rồng", 0, 10).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing.server_page.map(|p| p.total_elements), Some(1));
}
