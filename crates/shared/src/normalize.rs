//! Raw backend JSON → canonical records.
//!
//! The backend is not consistent about field names (`type` vs `itemType`,
//! `image` vs `imageUrl`) and regularly omits fields or sends `null`. This
//! module reconciles the names, applies defaults at the edge and maps tag
//! values onto closed enumerations. It never fails: a malformed record
//! degrades to defaults instead of aborting a whole list.
//!
//! Every function here accepts its own canonical output, so normalizing
//! twice is the same as normalizing once.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::models::{
    Balances, DomainRecord, Item, Listing, Pagination, Pet, Player, RecordId, ResourceKind,
    ShopListing, Tag, TagSet,
};

const DEFAULT_LEVEL: u32 = 1;
const DEFAULT_CARE_STAT: u8 = 50;
const DEFAULT_MAX_HP: u32 = 100;

/// Normalize a single raw record of the given kind.
pub fn normalize(kind: ResourceKind, raw: &Value) -> DomainRecord {
    let empty = Map::new();
    let obj = match raw.as_object() {
        Some(obj) => obj,
        None => {
            tracing::debug!(%kind, "record is not an object; using defaults");
            &empty
        }
    };
    match kind {
        ResourceKind::Players => DomainRecord::Player(player(obj)),
        ResourceKind::Pets => DomainRecord::Pet(pet(obj)),
        ResourceKind::Items => DomainRecord::Item(item(obj)),
        ResourceKind::Shops => DomainRecord::Shop(shop_listing(obj)),
    }
}

/// Normalize a list response.
///
/// Accepts a bare array, `{data: [...]}`, a paginated
/// `{content: [...], totalElements, totalPages, size, number}` envelope, or a
/// single record object. Array entries that are not objects are skipped.
pub fn normalize_listing(kind: ResourceKind, raw: &Value) -> Listing {
    let nothing: &[Value] = &[];
    let (entries, server_page): (&[Value], Option<Pagination>) = match raw {
        Value::Array(entries) => (entries.as_slice(), None),
        Value::Object(obj) => {
            if let Some(Value::Array(content)) = obj.get("content") {
                (content.as_slice(), Some(page_info(obj, content.len())))
            } else if let Some(Value::Array(data)) = obj.get("data") {
                (data.as_slice(), None)
            } else if let Some(Value::Object(inner)) = obj.get("data") {
                // `{data: {content: [...]}}` wraps a page in an envelope.
                return normalize_listing(kind, &Value::Object(inner.clone()));
            } else {
                (std::slice::from_ref(raw), None)
            }
        }
        Value::Null => (nothing, None),
        other => {
            tracing::debug!(%kind, value = %other, "unexpected list payload");
            (nothing, None)
        }
    };

    let records = entries
        .iter()
        .filter(|entry| {
            let keep = entry.is_object();
            if !keep {
                tracing::debug!(%kind, "skipping non-object list entry");
            }
            keep
        })
        .map(|entry| normalize(kind, entry))
        .collect();

    Listing {
        records,
        server_page,
    }
}

fn page_info(obj: &Map<String, Value>, content_len: usize) -> Pagination {
    let size = count(obj, &["size"]);
    let total_elements = first(obj, &["totalElements", "total"])
        .and_then(as_count)
        .unwrap_or(content_len as u64);
    let total_pages = match first(obj, &["totalPages"]).and_then(as_count) {
        Some(pages) => pages,
        None if size > 0 => total_elements.div_ceil(size),
        None => 0,
    };
    Pagination {
        page: count(obj, &["number", "page"]),
        size,
        total_elements,
        total_pages,
    }
}

pub fn player(obj: &Map<String, Value>) -> Player {
    let username = text(obj, &["username", "userName"]);
    let display_name = match opt_text(obj, &["displayName", "fullName", "name"]) {
        Some(name) => name,
        None => username.clone(),
    };
    let nested = obj.get("balances").and_then(Value::as_object);
    let balance = |keys: &[&str]| match nested {
        Some(b) if first(b, keys).is_some() => count(b, keys),
        _ => count(obj, keys),
    };

    let status = if first(obj, &["status"]).is_some() {
        tag(obj, &["status"])
    } else {
        match first(obj, &["banned", "isBanned"]).and_then(Value::as_bool) {
            Some(true) => Tag::parse(Some("banned")),
            _ => tag(obj, &["status"]),
        }
    };

    Player {
        id: id(obj, &["id", "playerId", "userId"]),
        username,
        display_name,
        email: text(obj, &["email"]),
        level: level(obj, &["level"]),
        balances: Balances {
            coin: balance(&["coin", "coins"]),
            diamond: balance(&["diamond", "diamonds"]),
            gem: balance(&["gem", "gems"]),
        },
        status,
        registered_at: timestamp(obj, &["registeredAt", "createdAt", "registrationDate"]),
        last_login_at: timestamp(obj, &["lastLoginAt", "lastLogin"]),
        total_pets: count(obj, &["totalPets", "petCount"]),
        total_items: count(obj, &["totalItems", "itemCount"]),
        total_achievements: count(obj, &["totalAchievements", "achievementCount"]),
    }
}

pub fn pet(obj: &Map<String, Value>) -> Pet {
    let owner_id = first(obj, &["ownerId", "playerId"])
        .and_then(as_id)
        .or_else(|| {
            obj.get("owner")
                .and_then(Value::as_object)
                .and_then(|owner| first(owner, &["id"]))
                .and_then(as_id)
        });

    let max_hp = match number(obj, &["maxHp", "maxHealth"]) {
        Some(n) if n >= 1.0 => to_u32(n),
        _ => DEFAULT_MAX_HP,
    };
    let hp = number(obj, &["hp", "currentHp", "health"])
        .map(to_u32)
        .unwrap_or(max_hp)
        .min(max_hp);

    Pet {
        id: id(obj, &["id", "petId"]),
        owner_id,
        name: text(obj, &["name", "petName"]),
        pet_type: tag(obj, &["type", "petType", "species"]),
        rarity: tag(obj, &["rarity"]),
        level: level(obj, &["level"]),
        attack: number(obj, &["attack"]).map(to_u32).unwrap_or(0),
        defense: number(obj, &["defense"]).map(to_u32).unwrap_or(0),
        speed: number(obj, &["speed"]).map(to_u32).unwrap_or(0),
        hp,
        max_hp,
        happiness: care_stat(obj, &["happiness"]),
        hunger: care_stat(obj, &["hunger"]),
        energy: care_stat(obj, &["energy"]),
        status: tag(obj, &["status", "isActive"]),
        image_url: opt_text(obj, &["imageUrl", "image"]),
    }
}

pub fn item(obj: &Map<String, Value>) -> Item {
    Item {
        id: id(obj, &["id", "itemId"]),
        name: text(obj, &["name", "itemName"]),
        description: text(obj, &["description"]),
        category: tag(obj, &["type", "itemType", "category"]),
        rarity: tag(obj, &["rarity"]),
        price: count(obj, &["price"]),
        quantity: count(obj, &["quantity"]),
        effects: effects(obj.get("effects")),
        image_url: opt_text(obj, &["imageUrl", "image"]),
    }
}

pub fn shop_listing(obj: &Map<String, Value>) -> ShopListing {
    let item_id = first(obj, &["itemId", "item_id"])
        .and_then(as_id)
        .or_else(|| {
            obj.get("item")
                .and_then(Value::as_object)
                .and_then(|item| first(item, &["id"]))
                .and_then(as_id)
        });

    let name = match opt_text(obj, &["name", "itemName"]) {
        Some(name) => name,
        None => obj
            .get("item")
            .and_then(Value::as_object)
            .map(|item| text(item, &["name"]))
            .unwrap_or_default(),
    };

    ShopListing {
        id: id(obj, &["id", "shopItemId"]),
        item_id,
        name,
        price: count(obj, &["price"]),
        currency: tag(obj, &["currency", "currencyType"]),
        stock: count(obj, &["stock", "quantity"]),
        active: flag(obj, &["active", "isActive"], true),
    }
}

// --- Field helpers ---

/// First present, non-null value among `keys`.
fn first<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn opt_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    let value = first(obj, keys)?;
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> String {
    opt_text(obj, keys).unwrap_or_default()
}

/// Numbers and numeric strings; anything else is absent.
fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Integers are taken exactly; floats and other numeric strings go through
/// `f64` and are floored at zero.
fn as_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if let Some(n) = value.as_str().and_then(|s| s.trim().parse::<u64>().ok()) {
        return Some(n);
    }
    as_number(value).map(to_u64)
}

fn as_id(value: &Value) -> Option<RecordId> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Some(n) = value.as_str().and_then(|s| s.trim().parse::<RecordId>().ok()) {
        return Some(n);
    }
    as_number(value).map(|n| n as RecordId)
}

fn number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    first(obj, keys).and_then(as_number)
}

fn to_u64(n: f64) -> u64 {
    if n <= 0.0 {
        0
    } else {
        n.floor().min(u64::MAX as f64) as u64
    }
}

fn to_u32(n: f64) -> u32 {
    if n <= 0.0 {
        0
    } else {
        n.floor().min(u32::MAX as f64) as u32
    }
}

/// Non-negative integer, `0` when missing or non-numeric.
fn count(obj: &Map<String, Value>, keys: &[&str]) -> u64 {
    first(obj, keys).and_then(as_count).unwrap_or(0)
}

fn level(obj: &Map<String, Value>, keys: &[&str]) -> u32 {
    number(obj, keys)
        .map(to_u32)
        .unwrap_or(DEFAULT_LEVEL)
        .max(DEFAULT_LEVEL)
}

fn care_stat(obj: &Map<String, Value>, keys: &[&str]) -> u8 {
    match number(obj, keys) {
        Some(n) => n.floor().clamp(0.0, 100.0) as u8,
        None => DEFAULT_CARE_STAT,
    }
}

fn id(obj: &Map<String, Value>, keys: &[&str]) -> RecordId {
    match first(obj, keys).and_then(as_id) {
        Some(n) => n,
        None => {
            tracing::debug!("record without a usable id");
            0
        }
    }
}

fn flag(obj: &Map<String, Value>, keys: &[&str], default: bool) -> bool {
    match first(obj, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(default),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "active" | "yes" => true,
            "false" | "0" | "inactive" | "disabled" | "no" => false,
            _ => default,
        },
        _ => default,
    }
}

fn tag<T: TagSet>(obj: &Map<String, Value>, keys: &[&str]) -> Tag<T> {
    let tag = match first(obj, keys) {
        None => Tag::Unknown { raw: None },
        Some(Value::String(s)) => Tag::parse(Some(s)),
        Some(Value::Number(n)) => Tag::parse(Some(&n.to_string())),
        Some(Value::Bool(b)) => Tag::parse(Some(&b.to_string())),
        // Our own sentinel form: `{"unknown": raw}`.
        Some(Value::Object(sentinel)) if sentinel.contains_key("unknown") => Tag::Unknown {
            raw: sentinel
                .get("unknown")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        Some(other) => Tag::Unknown {
            raw: Some(other.to_string()),
        },
    };
    if !tag.is_known() {
        tracing::debug!(field = keys[0], raw = ?tag.raw(), "tag outside known set");
    }
    tag
}

fn effects(value: Option<&Value>) -> BTreeMap<String, f64> {
    let parsed;
    let obj = match value {
        Some(Value::Object(obj)) => obj,
        // Some endpoints send the effects map as a JSON-encoded string.
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(obj)) => {
                parsed = obj;
                &parsed
            }
            _ => return BTreeMap::new(),
        },
        _ => return BTreeMap::new(),
    };
    obj.iter()
        .map(|(k, v)| (k.clone(), as_number(v).unwrap_or(0.0)))
        .collect()
}

/// RFC 3339, naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC), epoch millis, or a
/// Jackson-style `[y, m, d, h, min, s, nanos]` array.
fn timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    match first(obj, keys)? {
        Value::String(s) => parse_timestamp(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Value::Array(parts) => {
            let parts: Vec<i64> = parts.iter().filter_map(Value::as_i64).collect();
            let get = |i: usize| parts.get(i).copied().unwrap_or(0);
            let date = NaiveDate::from_ymd_opt(
                i32::try_from(get(0)).ok()?,
                u32::try_from(get(1)).ok()?,
                u32::try_from(get(2)).ok()?,
            )?;
            let time = date.and_hms_nano_opt(
                u32::try_from(get(3)).ok()?,
                u32::try_from(get(4)).ok()?,
                u32::try_from(get(5)).ok()?,
                u32::try_from(get(6)).ok()?,
            )?;
            Some(Utc.from_utc_datetime(&time))
        }
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
