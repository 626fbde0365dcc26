//! Canonical records for the admin dashboard.
//!
//! These are the shapes every screen works with after normalization. The
//! backend owns the data; the client only holds read copies.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Backend identifier. `0` marks a record whose id was missing upstream.
pub type RecordId = i64;

// --- Resource kinds ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Players,
    Pets,
    Items,
    Shops,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Players,
        ResourceKind::Pets,
        ResourceKind::Items,
        ResourceKind::Shops,
    ];

    /// Path segment used by the REST backend.
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Players => "players",
            ResourceKind::Pets => "pets",
            ResourceKind::Items => "items",
            ResourceKind::Shops => "shop",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Players => "players",
            ResourceKind::Pets => "pets",
            ResourceKind::Items => "items",
            ResourceKind::Shops => "shops",
        };
        f.write_str(name)
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "player" | "players" => Ok(ResourceKind::Players),
            "pet" | "pets" => Ok(ResourceKind::Pets),
            "item" | "items" => Ok(ResourceKind::Items),
            "shop" | "shops" => Ok(ResourceKind::Shops),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}

// --- Tags ---

/// A closed set of lowercase tokens a tag field may take.
pub trait TagSet: Sized + Copy + PartialEq + fmt::Debug + 'static {
    const VARIANTS: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// Match an already lowercased, trimmed token.
    fn from_token(token: &str) -> Option<Self> {
        Self::VARIANTS.iter().copied().find(|v| v.as_str() == token)
    }
}

/// A tag field after normalization.
///
/// Values outside the known set are kept as `Unknown` together with the raw
/// string, so lookups downstream can tell bad data from a missing icon.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag<T: TagSet> {
    Known(T),
    Unknown { raw: Option<String> },
}

pub const UNKNOWN_TAG: &str = "unknown";

impl<T: TagSet> Tag<T> {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Tag::Unknown { raw: None },
            Some(s) => match T::from_token(&s.trim().to_lowercase()) {
                Some(known) => Tag::Known(known),
                None => Tag::Unknown {
                    raw: Some(s.to_string()),
                },
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Known(v) => v.as_str(),
            Tag::Unknown { .. } => UNKNOWN_TAG,
        }
    }

    pub fn known(&self) -> Option<T> {
        match self {
            Tag::Known(v) => Some(*v),
            Tag::Unknown { .. } => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Tag::Known(_))
    }

    /// The raw backend value behind an unknown tag.
    pub fn raw(&self) -> Option<&str> {
        match self {
            Tag::Known(_) => None,
            Tag::Unknown { raw } => raw.as_deref(),
        }
    }
}

impl<T: TagSet> Default for Tag<T> {
    fn default() -> Self {
        Tag::Unknown { raw: None }
    }
}

impl<T: TagSet> From<T> for Tag<T> {
    fn from(value: T) -> Self {
        Tag::Known(value)
    }
}

impl<T: TagSet> fmt::Display for Tag<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TagRepr {
    Token(String),
    Unknown { unknown: Option<String> },
}

// Known tags serialize as their token, unknown ones as `{"unknown": <raw>}`.
impl<T: TagSet> Serialize for Tag<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Tag::Known(v) => serializer.serialize_str(v.as_str()),
            Tag::Unknown { raw } => TagRepr::Unknown {
                unknown: raw.clone(),
            }
            .serialize(serializer),
        }
    }
}

impl<'de, T: TagSet> Deserialize<'de> for Tag<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<TagRepr>::deserialize(deserializer)? {
            None => Tag::Unknown { raw: None },
            Some(TagRepr::Token(s)) => Tag::parse(Some(&s)),
            Some(TagRepr::Unknown { unknown }) => Tag::Unknown { raw: unknown },
        })
    }
}

macro_rules! tag_set {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $token:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl TagSet for $name {
            const VARIANTS: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }
    };
}

tag_set!(PlayerStatus {
    Active => "active",
    Inactive => "inactive",
    Banned => "banned",
});

tag_set!(PetType {
    Dragon => "dragon",
    Cat => "cat",
    Dog => "dog",
    Bird => "bird",
    Fish => "fish",
    Rabbit => "rabbit",
    Fox => "fox",
    Phoenix => "phoenix",
});

tag_set!(Rarity {
    Common => "common",
    Uncommon => "uncommon",
    Rare => "rare",
    Epic => "epic",
    Legendary => "legendary",
    Mythic => "mythic",
});

tag_set!(
    /// Item categories the shop and inventory screens know icons for.
    ItemCategory {
        Food => "food",
        Toy => "toy",
        Medicine => "medicine",
        Accessory => "accessory",
        Consumable => "consumable",
        Material => "material",
    }
);

tag_set!(Currency {
    Coin => "coin",
    Diamond => "diamond",
    Gem => "gem",
});

/// Pet lifecycle. The backend encodes it as `1` (active) / `0` (disabled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PetStatus {
    Active,
    Disabled,
}

impl PetStatus {
    pub fn code(&self) -> u8 {
        match self {
            PetStatus::Active => 1,
            PetStatus::Disabled => 0,
        }
    }
}

impl TagSet for PetStatus {
    const VARIANTS: &'static [Self] = &[PetStatus::Active, PetStatus::Disabled];

    fn as_str(&self) -> &'static str {
        match self {
            PetStatus::Active => "active",
            PetStatus::Disabled => "disabled",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "active" | "1" | "true" => Some(PetStatus::Active),
            "disabled" | "inactive" | "0" | "false" => Some(PetStatus::Disabled),
            _ => None,
        }
    }
}

// --- Records ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    pub coin: u64,
    pub diamond: u64,
    pub gem: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: RecordId,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub level: u32,
    pub balances: Balances,
    pub status: Tag<PlayerStatus>,
    pub registered_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub total_pets: u64,
    pub total_items: u64,
    pub total_achievements: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: RecordId,
    /// Lookup-only reference to the owning player.
    pub owner_id: Option<RecordId>,
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: Tag<PetType>,
    pub rarity: Tag<Rarity>,
    pub level: u32,
    pub attack: u32,
    pub defense: u32,
    pub speed: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub happiness: u8,
    pub hunger: u8,
    pub energy: u8,
    pub status: Tag<PetStatus>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub category: Tag<ItemCategory>,
    pub rarity: Tag<Rarity>,
    pub price: u64,
    pub quantity: u64,
    pub effects: BTreeMap<String, f64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopListing {
    pub id: RecordId,
    pub item_id: Option<RecordId>,
    pub name: String,
    pub price: u64,
    pub currency: Tag<Currency>,
    pub stock: u64,
    pub active: bool,
}

/// Any canonical record, tagged by the kind it was normalized as.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainRecord {
    Player(Player),
    Pet(Pet),
    Item(Item),
    Shop(ShopListing),
}

impl DomainRecord {
    pub fn kind(&self) -> ResourceKind {
        match self {
            DomainRecord::Player(_) => ResourceKind::Players,
            DomainRecord::Pet(_) => ResourceKind::Pets,
            DomainRecord::Item(_) => ResourceKind::Items,
            DomainRecord::Shop(_) => ResourceKind::Shops,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            DomainRecord::Player(p) => p.id,
            DomainRecord::Pet(p) => p.id,
            DomainRecord::Item(i) => i.id,
            DomainRecord::Shop(s) => s.id,
        }
    }

    pub fn as_player(&self) -> Option<&Player> {
        match self {
            DomainRecord::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_pet(&self) -> Option<&Pet> {
        match self {
            DomainRecord::Pet(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            DomainRecord::Item(i) => Some(i),
            _ => None,
        }
    }

    /// Canonical JSON form. Feeding it back through the normalizer yields
    /// the same record.
    pub fn to_value(&self) -> serde_json::Value {
        let value = match self {
            DomainRecord::Player(p) => serde_json::to_value(p),
            DomainRecord::Pet(p) => serde_json::to_value(p),
            DomainRecord::Item(i) => serde_json::to_value(i),
            DomainRecord::Shop(s) => serde_json::to_value(s),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for DomainRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DomainRecord::Player(p) => p.serialize(serializer),
            DomainRecord::Pet(p) => p.serialize(serializer),
            DomainRecord::Item(i) => i.serialize(serializer),
            DomainRecord::Shop(s) => s.serialize(serializer),
        }
    }
}

// --- Collections ---

/// Page metadata, shared by server-side pages and the client query pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// 0-based page index.
    pub page: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
}

/// A normalized list response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub records: Vec<DomainRecord>,
    /// Present when the backend answered with a paginated envelope.
    pub server_page: Option<Pagination>,
}

impl Listing {
    pub fn new(records: Vec<DomainRecord>) -> Self {
        Self {
            records,
            server_page: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn players(&self) -> Vec<Player> {
        self.records.iter().filter_map(DomainRecord::as_player).cloned().collect()
    }

    pub fn pets(&self) -> Vec<Pet> {
        self.records.iter().filter_map(DomainRecord::as_pet).cloned().collect()
    }

    pub fn items(&self) -> Vec<Item> {
        self.records.iter().filter_map(DomainRecord::as_item).cloned().collect()
    }
}

// --- Auth ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Cached profile of the signed-in admin.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
