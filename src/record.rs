//! Cocktail and ingredient records, their storage projections, and normalization.

use std::fmt::Debug;

use hashbrown::HashSet;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::types::{RecordId, RecordKind, TimestampMs};

/// Label attached to a cocktail or ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag id; builtin and custom tags share one id space per kind.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Optional display colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Alternative ingredient allowed for one recipe line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Substitute {
    /// Referenced ingredient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<RecordId>,
    /// Display name.
    pub name: String,
    /// True when the substitute is a specific brand.
    #[serde(default, skip_serializing_if = "is_false")]
    pub brand: bool,
}

/// One line of a cocktail recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CocktailIngredient {
    /// Position in the recipe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Referenced ingredient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<RecordId>,
    /// Display name.
    pub name: String,
    /// Free-form amount text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Unit of `amount`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<i64>,
    /// Line may be skipped.
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    /// Line is a garnish.
    #[serde(default, skip_serializing_if = "is_false")]
    pub garnish: bool,
    /// Base ingredient may stand in.
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_base_substitution: bool,
    /// Other brands may stand in.
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_brand_substitution: bool,
    /// Other styles may stand in.
    #[serde(default, skip_serializing_if = "is_false")]
    pub allow_style_substitution: bool,
    /// Explicit substitutes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutes: Vec<Substitute>,
}

/// Derived search index fields; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchFields {
    /// Normalized name and synonyms joined by spaces.
    pub name_normalized: String,
    /// Unique normalized words of name and synonyms.
    pub tokens_normalized: Vec<String>,
}

impl SearchFields {
    /// Builds search fields from a display name plus synonyms.
    pub fn build(name: &str, synonyms: &[String]) -> Self {
        let names: Vec<String> = std::iter::once(name)
            .chain(synonyms.iter().map(String::as_str))
            .map(normalize_search_text)
            .filter(|value| !value.is_empty())
            .collect();

        let mut seen = HashSet::new();
        let tokens_normalized = names
            .iter()
            .flat_map(|value| value.split(' '))
            .filter(|token| seen.insert(*token))
            .map(str::to_string)
            .collect();

        Self {
            name_normalized: names.join(" "),
            tokens_normalized,
        }
    }
}

/// Live cocktail as held in [`crate::core::state::InventoryState`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cocktail {
    /// Stable id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Alternative names.
    pub synonyms: Vec<String>,
    /// Description text.
    pub description: Option<String>,
    /// Preparation text.
    pub instructions: Option<String>,
    /// Photo location.
    pub photo_uri: Option<String>,
    /// Glassware id.
    pub glass_id: Option<String>,
    /// Preparation methods.
    pub method_ids: Vec<String>,
    /// Attached tags in any order.
    pub tags: Vec<Tag>,
    /// Recipe lines in any order.
    pub ingredients: Vec<CocktailIngredient>,
    /// Creation time for user-created cocktails.
    pub created_at: Option<TimestampMs>,
    /// Last edit time for user-edited cocktails.
    pub updated_at: Option<TimestampMs>,
    /// Derived search index.
    pub search: SearchFields,
}

/// Persistable projection of a [`Cocktail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CocktailStorageRecord {
    /// Stable id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Alternative names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    /// Description text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Preparation text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Photo location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_uri: Option<String>,
    /// Glassware id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glass_id: Option<String>,
    /// Preparation methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub method_ids: Vec<String>,
    /// Tags sorted by id, then name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// Recipe lines sorted by order, then name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<CocktailIngredient>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<TimestampMs>,
    /// Last edit time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<TimestampMs>,
}

/// Live ingredient as held in [`crate::core::state::InventoryState`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ingredient {
    /// Stable id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Alternative names.
    pub synonyms: Vec<String>,
    /// Description text.
    pub description: Option<String>,
    /// Attached tags in any order.
    pub tags: Vec<Tag>,
    /// Generic ingredient this one is a brand of.
    pub base_ingredient_id: Option<RecordId>,
    /// Ingredient this one is a style of.
    pub style_ingredient_id: Option<RecordId>,
    /// Photo location.
    pub photo_uri: Option<String>,
    /// Derived search index.
    pub search: SearchFields,
}

/// Persistable projection of an [`Ingredient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IngredientStorageRecord {
    /// Stable id.
    pub id: RecordId,
    /// Display name.
    pub name: String,
    /// Alternative names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    /// Description text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tags sorted by id, then name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// Generic ingredient this one is a brand of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_ingredient_id: Option<RecordId>,
    /// Ingredient this one is a style of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_ingredient_id: Option<RecordId>,
    /// Photo location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_uri: Option<String>,
}

/// Canonical, persistable form of a record.
pub trait StorageRecord:
    Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Record id as stored.
    fn id(&self) -> RecordId;

    /// Returns the canonical form: list fields filtered and sorted, blanks dropped.
    fn normalized(self) -> Self;
}

/// Live record that projects onto a [`StorageRecord`].
pub trait InventoryRecord: Clone + Debug + Send + Sync + 'static {
    /// Storage projection type.
    type Storage: StorageRecord;
    /// Collection this record lives in.
    const KIND: RecordKind;

    /// Record id.
    fn id(&self) -> RecordId;

    /// Projects onto the canonical storage form.
    fn to_storage_record(&self) -> Self::Storage;

    /// Rebuilds a live record, recomputing derived fields.
    fn from_storage_record(record: Self::Storage) -> Self;
}

impl StorageRecord for CocktailStorageRecord {
    fn id(&self) -> RecordId {
        self.id
    }

    fn normalized(mut self) -> Self {
        self.synonyms = normalize_synonyms(&self.synonyms);
        self.tags = normalize_tags(&self.tags);
        self.ingredients = normalize_recipe(&self.ingredients);
        self
    }
}

impl StorageRecord for IngredientStorageRecord {
    fn id(&self) -> RecordId {
        self.id
    }

    fn normalized(mut self) -> Self {
        self.synonyms = normalize_synonyms(&self.synonyms);
        self.tags = normalize_tags(&self.tags);
        self
    }
}

impl Cocktail {
    /// Recomputes [`Cocktail::search`] from name and synonyms.
    pub fn refresh_search_fields(&mut self) {
        self.search = SearchFields::build(&self.name, &self.synonyms);
    }
}

impl Ingredient {
    /// Recomputes [`Ingredient::search`] from name and synonyms.
    pub fn refresh_search_fields(&mut self) {
        self.search = SearchFields::build(&self.name, &self.synonyms);
    }
}

impl InventoryRecord for Cocktail {
    type Storage = CocktailStorageRecord;
    const KIND: RecordKind = RecordKind::Cocktail;

    fn id(&self) -> RecordId {
        self.id
    }

    fn to_storage_record(&self) -> CocktailStorageRecord {
        CocktailStorageRecord {
            id: self.id,
            name: self.name.clone(),
            synonyms: self.synonyms.clone(),
            description: self.description.clone(),
            instructions: self.instructions.clone(),
            photo_uri: self.photo_uri.clone(),
            glass_id: self.glass_id.clone(),
            method_ids: self.method_ids.clone(),
            tags: self.tags.clone(),
            ingredients: self.ingredients.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .normalized()
    }

    fn from_storage_record(record: CocktailStorageRecord) -> Self {
        let mut cocktail = Self {
            id: record.id,
            name: record.name,
            synonyms: record.synonyms,
            description: record.description,
            instructions: record.instructions,
            photo_uri: record.photo_uri,
            glass_id: record.glass_id,
            method_ids: record.method_ids,
            tags: record.tags,
            ingredients: record.ingredients,
            created_at: record.created_at,
            updated_at: record.updated_at,
            search: SearchFields::default(),
        };
        cocktail.refresh_search_fields();
        cocktail
    }
}

impl InventoryRecord for Ingredient {
    type Storage = IngredientStorageRecord;
    const KIND: RecordKind = RecordKind::Ingredient;

    fn id(&self) -> RecordId {
        self.id
    }

    fn to_storage_record(&self) -> IngredientStorageRecord {
        IngredientStorageRecord {
            id: self.id,
            name: self.name.clone(),
            synonyms: self.synonyms.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            base_ingredient_id: self.base_ingredient_id,
            style_ingredient_id: self.style_ingredient_id,
            photo_uri: self.photo_uri.clone(),
        }
        .normalized()
    }

    fn from_storage_record(record: IngredientStorageRecord) -> Self {
        let mut ingredient = Self {
            id: record.id,
            name: record.name,
            synonyms: record.synonyms,
            description: record.description,
            tags: record.tags,
            base_ingredient_id: record.base_ingredient_id,
            style_ingredient_id: record.style_ingredient_id,
            photo_uri: record.photo_uri,
            search: SearchFields::default(),
        };
        ingredient.refresh_search_fields();
        ingredient
    }
}

/// Lowercases, maps non-alphanumerics to spaces, and collapses whitespace.
pub fn normalize_search_text(value: &str) -> String {
    let mut folded = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_alphanumeric() {
            folded.extend(ch.to_lowercase());
        } else {
            folded.push(' ');
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims synonyms and drops blanks and case-insensitive duplicates, keeping first spelling.
pub fn normalize_synonyms(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .filter(|value| seen.insert(value.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Drops tags with a negative id or blank name and sorts by id, then name.
pub fn normalize_tags(tags: &[Tag]) -> Vec<Tag> {
    let mut out: Vec<Tag> = tags
        .iter()
        .filter(|tag| tag.id >= 0)
        .filter_map(|tag| {
            let name = tag.name.trim();
            (!name.is_empty()).then(|| Tag {
                id: tag.id,
                name: name.to_string(),
                color: tag.color.clone(),
            })
        })
        .collect();
    out.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.color.cmp(&b.color))
    });
    out
}

/// Drops unnamed recipe lines and substitutes and sorts lines by order, then name.
pub fn normalize_recipe(lines: &[CocktailIngredient]) -> Vec<CocktailIngredient> {
    let mut out: Vec<CocktailIngredient> = lines
        .iter()
        .filter(|line| !line.name.trim().is_empty())
        .map(|line| CocktailIngredient {
            substitutes: line
                .substitutes
                .iter()
                .filter(|sub| !sub.name.trim().is_empty())
                .cloned()
                .collect(),
            ..line.clone()
        })
        .collect();
    out.sort_by(|a, b| {
        a.order
            .unwrap_or(0)
            .cmp(&b.order.unwrap_or(0))
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

fn is_false(value: &bool) -> bool {
    !*value
}
