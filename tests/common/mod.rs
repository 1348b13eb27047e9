#![allow(dead_code)]

use std::sync::Arc;

use barsync::{
    catalog::{CatalogData, StaticCatalog},
    core::baseline::{Baseline, BaselineCache},
    record::{
        Cocktail, CocktailIngredient, CocktailStorageRecord, Ingredient, IngredientStorageRecord,
        InventoryRecord, Substitute, Tag,
    },
    types::{AppLocale, RecordId},
};

pub const BASE_COCKTAIL_IDS: [RecordId; 6] = [1, 2, 3, 4, 5, 42];
pub const BASE_INGREDIENT_IDS: [RecordId; 4] = [100, 101, 102, 103];

pub fn tag(id: RecordId, name: &str) -> Tag {
    Tag {
        id,
        name: name.to_string(),
        color: None,
    }
}

pub fn line(order: i64, ingredient_id: RecordId, name: &str) -> CocktailIngredient {
    CocktailIngredient {
        order: Some(order),
        ingredient_id: Some(ingredient_id),
        name: name.to_string(),
        amount: Some("30".to_string()),
        unit_id: Some(1),
        ..Default::default()
    }
}

pub fn cocktail_record(id: RecordId, name: &str) -> CocktailStorageRecord {
    CocktailStorageRecord {
        id,
        name: name.to_string(),
        synonyms: vec![format!("{name} classic")],
        instructions: Some("Stir with ice.".to_string()),
        // Deliberately out of canonical order.
        tags: vec![tag(7, "bitter"), tag(2, "classic")],
        ingredients: vec![
            line(2, 101, "Campari"),
            CocktailIngredient {
                substitutes: vec![
                    Substitute {
                        ingredient_id: Some(103),
                        name: "Old Tom Gin".to_string(),
                        brand: false,
                    },
                    Substitute::default(),
                ],
                ..line(1, 100, "Gin")
            },
            line(3, 102, "Sweet Vermouth"),
        ],
        ..Default::default()
    }
}

pub fn ingredient_record(id: RecordId, name: &str) -> IngredientStorageRecord {
    IngredientStorageRecord {
        id,
        name: name.to_string(),
        tags: vec![tag(3, "spirit")],
        ..Default::default()
    }
}

pub fn catalog_data() -> CatalogData {
    let names = ["Negroni", "Martini", "Boulevardier", "Americano", "Gimlet", "Aviation"];
    CatalogData {
        cocktails: BASE_COCKTAIL_IDS
            .iter()
            .zip(names)
            .map(|(&id, name)| cocktail_record(id, name))
            .collect(),
        ingredients: vec![
            ingredient_record(100, "Gin"),
            ingredient_record(101, "Campari"),
            ingredient_record(102, "Sweet Vermouth"),
            ingredient_record(103, "Old Tom Gin"),
        ],
    }
}

pub fn catalog() -> Arc<StaticCatalog> {
    Arc::new(StaticCatalog::new(catalog_data()))
}

pub fn baseline() -> Arc<Baseline> {
    BaselineCache::new(catalog(), AppLocale::EnGb).get()
}

pub fn cocktail(id: RecordId, name: &str) -> Cocktail {
    Cocktail::from_storage_record(cocktail_record(id, name))
}

pub fn ingredient(id: RecordId, name: &str) -> Ingredient {
    Ingredient::from_storage_record(ingredient_record(id, name))
}
