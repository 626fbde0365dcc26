//! Search, filter, sort and paginate a normalized collection.
//!
//! Every list screen runs the same pipeline over whatever collection the
//! cache returned:
//!
//! ```text
//! records ─▶ search ─▶ filters (AND) ─▶ stable sort ─▶ page slice
//! ```
//!
//! Pages are 0-based. A page index past the end is clamped to the last page
//! instead of yielding an empty slice.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use petadmin_shared::{DomainRecord, Item, Pagination, Pet, Player, ShopListing, Tag, TagSet};

// --- Record fields ---

/// A record field as seen by filters and sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
    Null,
}

impl FieldValue {
    fn sort_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.to_lowercase(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Time(t) => t.to_rfc3339(),
            FieldValue::Null => String::new(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_string())
}

fn num(n: impl Into<f64>) -> FieldValue {
    FieldValue::Number(n.into())
}

fn count(n: u64) -> FieldValue {
    FieldValue::Number(n as f64)
}

fn time(t: Option<DateTime<Utc>>) -> FieldValue {
    t.map(FieldValue::Time).unwrap_or(FieldValue::Null)
}

fn tag<T: TagSet>(t: &Tag<T>) -> FieldValue {
    text(t.as_str())
}

/// Field access for the pipeline.
pub trait Queryable {
    /// Text fields the search box matches against.
    fn search_fields(&self) -> Vec<&str>;

    /// A field by canonical name; `Null` when the record has no such field.
    fn field(&self, name: &str) -> FieldValue;
}

impl Queryable for Player {
    fn search_fields(&self) -> Vec<&str> {
        vec![&self.username, &self.display_name, &self.email]
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => num(self.id as f64),
            "username" => text(&self.username),
            "name" | "displayName" => text(&self.display_name),
            "email" => text(&self.email),
            "level" => num(self.level),
            "coin" => count(self.balances.coin),
            "diamond" => count(self.balances.diamond),
            "gem" => count(self.balances.gem),
            "status" => tag(&self.status),
            "registeredAt" => time(self.registered_at),
            "lastLoginAt" => time(self.last_login_at),
            "totalPets" => count(self.total_pets),
            "totalItems" => count(self.total_items),
            "totalAchievements" => count(self.total_achievements),
            _ => FieldValue::Null,
        }
    }
}

impl Queryable for Pet {
    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name]
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => num(self.id as f64),
            "ownerId" => self
                .owner_id
                .map(|id| FieldValue::Number(id as f64))
                .unwrap_or(FieldValue::Null),
            "name" => text(&self.name),
            "type" => tag(&self.pet_type),
            "rarity" => tag(&self.rarity),
            "level" => num(self.level),
            "attack" => num(self.attack),
            "defense" => num(self.defense),
            "speed" => num(self.speed),
            "hp" => num(self.hp),
            "maxHp" => num(self.max_hp),
            "happiness" => num(self.happiness),
            "hunger" => num(self.hunger),
            "energy" => num(self.energy),
            "status" => tag(&self.status),
            _ => FieldValue::Null,
        }
    }
}

impl Queryable for Item {
    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name]
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => num(self.id as f64),
            "name" => text(&self.name),
            "type" => tag(&self.category),
            "rarity" => tag(&self.rarity),
            "price" => count(self.price),
            "quantity" => count(self.quantity),
            _ => FieldValue::Null,
        }
    }
}

impl Queryable for ShopListing {
    fn search_fields(&self) -> Vec<&str> {
        vec![&self.name]
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => num(self.id as f64),
            "itemId" => self
                .item_id
                .map(|id| FieldValue::Number(id as f64))
                .unwrap_or(FieldValue::Null),
            "name" => text(&self.name),
            "price" => count(self.price),
            "currency" => tag(&self.currency),
            "stock" => count(self.stock),
            "active" => text(if self.active { "true" } else { "false" }),
            _ => FieldValue::Null,
        }
    }
}

impl Queryable for DomainRecord {
    fn search_fields(&self) -> Vec<&str> {
        match self {
            DomainRecord::Player(p) => p.search_fields(),
            DomainRecord::Pet(p) => p.search_fields(),
            DomainRecord::Item(i) => i.search_fields(),
            DomainRecord::Shop(s) => s.search_fields(),
        }
    }

    fn field(&self, name: &str) -> FieldValue {
        match self {
            DomainRecord::Player(p) => p.field(name),
            DomainRecord::Pet(p) => p.field(name),
            DomainRecord::Item(i) => i.field(name),
            DomainRecord::Shop(s) => s.field(name),
        }
    }
}

// --- Filters ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelBucket {
    /// 1..=10
    Low,
    /// 11..=30
    Medium,
    /// 31 and up
    High,
}

impl LevelBucket {
    pub fn contains(&self, level: f64) -> bool {
        match self {
            LevelBucket::Low => level <= 10.0,
            LevelBucket::Medium => (11.0..=30.0).contains(&level),
            LevelBucket::High => level >= 31.0,
        }
    }
}

impl FromStr for LevelBucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(LevelBucket::Low),
            "medium" => Ok(LevelBucket::Medium),
            "high" => Ok(LevelBucket::High),
            other => Err(format!("unknown level bucket: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Case-insensitive equality for text and tags, numeric equality for numbers.
    Exact(String),
    /// Inclusive numeric range; open on a missing side.
    Range { min: Option<f64>, max: Option<f64> },
    Level(LevelBucket),
}

impl Filter {
    /// Parse a filter value as typed in a select box or on the command line.
    ///
    /// `None` for empty or `"all"`, which mean "no filter". `low`/`medium`/
    /// `high` on the `level` field become buckets, `a..b` becomes a range.
    pub fn parse(name: &str, value: &str) -> Option<Filter> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return None;
        }
        if name == "level" {
            if let Ok(bucket) = value.parse::<LevelBucket>() {
                return Some(Filter::Level(bucket));
            }
        }
        if let Some((lo, hi)) = value.split_once("..") {
            let bound = |s: &str| s.trim().parse::<f64>().ok();
            let (min, max) = (bound(lo), bound(hi));
            if min.is_some() || max.is_some() {
                return Some(Filter::Range { min, max });
            }
        }
        Some(Filter::Exact(value.to_string()))
    }

    pub fn matches(&self, field: &FieldValue) -> bool {
        match self {
            Filter::Exact(expected) => match field {
                FieldValue::Text(s) => s.to_lowercase() == expected.to_lowercase(),
                FieldValue::Number(n) => expected.trim().parse::<f64>().ok() == Some(*n),
                FieldValue::Time(t) => t.to_rfc3339().starts_with(expected.as_str()),
                FieldValue::Null => false,
            },
            Filter::Range { min, max } => match field.as_number() {
                Some(n) => min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi),
                None => false,
            },
            Filter::Level(bucket) => field.as_number().is_some_and(|n| bucket.contains(n)),
        }
    }
}

// --- Sorting ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn compare<T: Queryable>(&self, a: &T, b: &T) -> Ordering {
        let ord = compare_fields(&a.field(&self.key), &b.field(&self.key));
        match self.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// `key`, `key:asc` or `key:desc`.
impl FromStr for SortSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, direction) = match s.split_once(':') {
            Some((key, dir)) => match dir.trim().to_lowercase().as_str() {
                "asc" => (key, SortDirection::Asc),
                "desc" => (key, SortDirection::Desc),
                other => return Err(format!("unknown sort direction: {other}")),
            },
            None => (s, SortDirection::Asc),
        };
        let key = key.trim();
        if key.is_empty() {
            return Err("empty sort key".into());
        }
        Ok(Self {
            key: key.to_string(),
            direction,
        })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        write!(f, "{}:{dir}", self.key)
    }
}

fn compare_fields(a: &FieldValue, b: &FieldValue) -> Ordering {
    match (a, b) {
        (FieldValue::Number(x), FieldValue::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (FieldValue::Time(x), FieldValue::Time(y)) => x.cmp(y),
        // Text compares case-insensitively; missing values sort as "".
        _ => a.sort_text().cmp(&b.sort_text()),
    }
}

// --- Query state ---

/// What a list screen is currently asking for.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    /// What the user has typed so far.
    pub search_input: String,
    /// The term the pipeline runs with, committed after the debounce window.
    pub search: String,
    pub filters: BTreeMap<String, Filter>,
    pub sort: Option<SortSpec>,
    pub page: u64,
    pub size: u64,
}

impl QueryState {
    pub fn new(size: u64) -> Self {
        Self {
            search_input: String::new(),
            search: String::new(),
            filters: BTreeMap::new(),
            sort: None,
            page: 0,
            size: size.max(1),
        }
    }

    /// Record a keystroke. Does not affect results until committed.
    pub fn set_search_input(&mut self, input: impl Into<String>) {
        self.search_input = input.into();
    }

    /// Commit a (debounced) search term.
    pub fn set_search(&mut self, term: impl Into<String>) {
        let term = term.into();
        self.search_input = term.clone();
        self.search = term;
        self.page = 0;
    }

    pub fn commit_search(&mut self) {
        self.search = self.search_input.clone();
        self.page = 0;
    }

    /// Set or clear (`None`) the filter on `name`.
    pub fn set_filter(&mut self, name: impl Into<String>, filter: Option<Filter>) {
        let name = name.into();
        match filter {
            Some(filter) => {
                self.filters.insert(name, filter);
            }
            None => {
                self.filters.remove(&name);
            }
        }
        self.page = 0;
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
        self.page = 0;
    }

    /// Click on a column header: asc → desc → none.
    pub fn toggle_sort(&mut self, key: &str) {
        let next = match &self.sort {
            Some(s) if s.key == key && s.direction == SortDirection::Asc => Some(SortSpec::desc(key)),
            Some(s) if s.key == key => None,
            _ => Some(SortSpec::asc(key)),
        };
        self.set_sort(next);
    }

    pub fn set_page(&mut self, page: u64) {
        self.page = page;
    }

    pub fn set_page_size(&mut self, size: u64) {
        self.size = size.max(1);
        self.page = 0;
    }
}

fn clamp(page: u64, total_pages: u64) -> u64 {
    if total_pages == 0 {
        0
    } else {
        page.min(total_pages - 1)
    }
}

// --- Pipeline ---

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    pub page: Vec<T>,
    pub pagination: Pagination,
}

impl<T> QueryResult<T> {
    pub fn empty(size: u64) -> Self {
        Self {
            page: Vec::new(),
            pagination: Pagination {
                page: 0,
                size,
                total_elements: 0,
                total_pages: 0,
            },
        }
    }
}

fn matches_search<T: Queryable>(record: &T, term: &str) -> bool {
    term.is_empty()
        || record
            .search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(term))
}

/// Run the pipeline. The returned page index is already clamped.
pub fn apply<T: Queryable + Clone>(collection: &[T], state: &QueryState) -> QueryResult<T> {
    let term = state.search.trim().to_lowercase();

    let mut matched: Vec<&T> = collection
        .iter()
        .filter(|record| matches_search(*record, &term))
        .filter(|record| {
            state
                .filters
                .iter()
                .all(|(name, filter)| filter.matches(&record.field(name)))
        })
        .collect();

    // `sort_by` is stable: equal keys keep their original order.
    if let Some(sort) = &state.sort {
        matched.sort_by(|a, b| sort.compare(*a, *b));
    }

    let size = state.size.max(1);
    let total_elements = matched.len() as u64;
    let total_pages = total_elements.div_ceil(size);
    let page = clamp(state.page, total_pages);

    let rows = matched
        .into_iter()
        .skip((page * size) as usize)
        .take(size as usize)
        .cloned()
        .collect();

    QueryResult {
        page: rows,
        pagination: Pagination {
            page,
            size,
            total_elements,
            total_pages,
        },
    }
}

/// Run the pipeline and write the corrected page index back into `state`.
pub fn run<T: Queryable + Clone>(collection: &[T], state: &mut QueryState) -> QueryResult<T> {
    let result = apply(collection, state);
    state.page = result.pagination.page;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use petadmin_shared::{normalize, ResourceKind};
    use serde_json::json;

    fn items(names: &[&str]) -> Vec<DomainRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| normalize(ResourceKind::Items, &json!({ "id": i + 1, "name": name })))
            .collect()
    }

    fn pets(rows: &[(i64, &str, u32, &str)]) -> Vec<Pet> {
        rows.iter()
            .map(|(id, name, level, rarity)| {
                normalize(
                    ResourceKind::Pets,
                    &json!({ "id": id, "name": name, "level": level, "rarity": rarity }),
                )
                .as_pet()
                .cloned()
                .unwrap()
            })
            .collect()
    }

    fn ids(rows: &[Pet]) -> Vec<i64> {
        rows.iter().map(|p| p.id).collect()
    }

    #[test]
    fn first_page_of_twelve() {
        let names: Vec<String> = (0..12).map(|i| format!("item {i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let collection = items(&names);

        let result = apply(&collection, &QueryState::new(6));
        assert_eq!(result.page, collection[0..6].to_vec());
        assert_eq!(result.pagination.total_pages, 2);
        assert_eq!(result.pagination.total_elements, 12);
        assert_eq!(result.pagination.page, 0);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let collection = items(&["Rồng Lửa", "Mèo"]);
        let mut state = QueryState::new(10);
        state.set_search("rồng");

        let result = apply(&collection, &state);
        let names: Vec<_> = result.page.iter().map(|r| r.as_item().unwrap().name.as_str()).collect();
        assert_eq!(names, vec!["Rồng Lửa"]);
    }

    #[test]
    fn whitespace_search_is_no_filter() {
        let collection = items(&["a", "b", "c"]);
        let mut state = QueryState::new(10);
        state.set_search("   ");
        assert_eq!(apply(&collection, &state).pagination.total_elements, 3);
    }

    #[test]
    fn player_search_covers_username_and_email() {
        let players: Vec<Player> = [
            json!({ "id": 1, "username": "hoa", "email": "hoa@mail.vn" }),
            json!({ "id": 2, "username": "binh", "email": "binh@GAME.vn" }),
        ]
        .iter()
        .map(|raw| normalize(ResourceKind::Players, raw).as_player().cloned().unwrap())
        .collect();

        let mut state = QueryState::new(10);
        state.set_search("game.VN");
        let result = apply(&players, &state);
        assert_eq!(result.page.len(), 1);
        assert_eq!(result.page[0].username, "binh");
    }

    #[test]
    fn filters_compose_with_and() {
        let collection = pets(&[
            (1, "a", 5, "rare"),
            (2, "b", 15, "rare"),
            (3, "c", 40, "RARE"),
            (4, "d", 45, "common"),
        ]);
        let mut state = QueryState::new(10);
        state.set_filter("rarity", Filter::parse("rarity", "rare"));
        state.set_filter("level", Filter::parse("level", "high"));

        assert_eq!(ids(&apply(&collection, &state).page), vec![3]);

        state.set_filter("level", Filter::parse("level", "all"));
        assert_eq!(ids(&apply(&collection, &state).page), vec![1, 2, 3]);

        state.set_filter("level", Filter::parse("level", "10..20"));
        assert_eq!(ids(&apply(&collection, &state).page), vec![2]);
    }

    #[test]
    fn unknown_tag_is_filterable() {
        let collection = pets(&[(1, "a", 1, "godly"), (2, "b", 1, "epic")]);
        let mut state = QueryState::new(10);
        state.set_filter("rarity", Filter::parse("rarity", "unknown"));
        assert_eq!(ids(&apply(&collection, &state).page), vec![1]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let collection = pets(&[
            (1, "x", 3, "rare"),
            (2, "y", 1, "rare"),
            (3, "z", 3, "rare"),
            (4, "w", 1, "rare"),
            (5, "v", 3, "rare"),
        ]);
        let mut state = QueryState::new(10);

        state.set_sort(Some(SortSpec::asc("level")));
        assert_eq!(ids(&apply(&collection, &state).page), vec![2, 4, 1, 3, 5]);

        state.set_sort(Some(SortSpec::desc("level")));
        assert_eq!(ids(&apply(&collection, &state).page), vec![1, 3, 5, 2, 4]);
    }

    #[test]
    fn text_sort_ignores_case() {
        let collection = pets(&[(1, "bravo", 1, ""), (2, "Alpha", 1, ""), (3, "charlie", 1, "")]);
        let mut state = QueryState::new(10);
        state.set_sort(Some("name".parse().unwrap()));
        assert_eq!(ids(&apply(&collection, &state).page), vec![2, 1, 3]);
    }

    #[test]
    fn missing_values_sort_as_empty_text() {
        let players: Vec<Player> = [
            json!({ "id": 1, "lastLogin": "2024-01-02T00:00:00Z" }),
            json!({ "id": 2 }),
        ]
        .iter()
        .map(|raw| normalize(ResourceKind::Players, raw).as_player().cloned().unwrap())
        .collect();

        let mut state = QueryState::new(10);
        state.set_sort(Some(SortSpec::asc("lastLoginAt")));
        let ordered: Vec<_> = apply(&players, &state).page.iter().map(|p| p.id).collect();
        assert_eq!(ordered, vec![2, 1]);
    }

    #[test]
    fn out_of_range_page_is_clamped() {
        let collection = items(&["a", "b", "c", "d", "e"]);
        let mut state = QueryState::new(2);
        state.set_page(7);

        let result = run(&collection, &mut state);
        assert_eq!(result.pagination.page, 2);
        assert_eq!(state.page, 2);
        assert_eq!(result.page.len(), 1);
    }

    #[test]
    fn empty_collection_has_no_pages() {
        let collection: Vec<DomainRecord> = Vec::new();
        let mut state = QueryState::new(5);
        state.set_page(3);
        let result = apply(&collection, &state);
        assert_eq!(result, QueryResult::empty(5));
    }

    #[test]
    fn pages_cover_collection_exactly() {
        for n in 0..30usize {
            for size in 1..8u64 {
                let names: Vec<String> = (0..n).map(|i| i.to_string()).collect();
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                let collection = items(&names);
                let mut state = QueryState::new(size);

                let total_pages = apply(&collection, &state).pagination.total_pages;
                assert_eq!(total_pages, (n as u64).div_ceil(size));
                assert_eq!(total_pages == 0, n == 0);

                let mut seen = 0;
                for page in 0..total_pages {
                    state.set_page(page);
                    seen += apply(&collection, &state).page.len();
                }
                assert_eq!(seen, n);
            }
        }
    }

    #[test]
    fn changing_query_resets_page() {
        let mut state = QueryState::new(5);
        state.set_page(4);
        state.set_search("x");
        assert_eq!(state.page, 0);

        state.set_page(4);
        state.set_filter("type", Filter::parse("type", "food"));
        assert_eq!(state.page, 0);

        state.set_page(4);
        state.toggle_sort("price");
        assert_eq!(state.page, 0);
        assert_eq!(state.sort, Some(SortSpec::asc("price")));
        state.toggle_sort("price");
        assert_eq!(state.sort, Some(SortSpec::desc("price")));
        state.toggle_sort("price");
        assert_eq!(state.sort, None);
    }

    #[test]
    fn negative_ids_keep_their_order() {
        let collection = pets(&[
            (2, "a", 1, "rare"),
            (-3, "b", 1, "rare"),
            (0, "c", 1, "rare"),
            (-1, "d", 1, "rare"),
        ]);
        let mut state = QueryState::new(10);
        state.set_sort(Some(SortSpec::asc("id")));
        assert_eq!(ids(&apply(&collection, &state).page), vec![-3, -1, 0, 2]);

        state.set_filter("id", Filter::parse("id", "-3"));
        assert_eq!(ids(&apply(&collection, &state).page), vec![-3]);
    }

    #[test]
    fn sort_spec_parsing() {
        assert_eq!("level:desc".parse::<SortSpec>(), Ok(SortSpec::desc("level")));
        assert_eq!("name".parse::<SortSpec>(), Ok(SortSpec::asc("name")));
        assert!("name:sideways".parse::<SortSpec>().is_err());
        assert_eq!(SortSpec::desc("level").to_string(), "level:desc");
    }
}
