//! Inventory delta tracking, versioned snapshots, and last-write-wins remote sync over an
//! immutable bundled catalog.
//!
//! # Examples
//!
//! Computing a delta against the baseline:
//! ```
//! use std::sync::Arc;
//!
//! use barsync::{
//!     catalog::{CatalogData, StaticCatalog},
//!     core::baseline::BaselineCache,
//!     delta::calculator::DeltaCalculator,
//!     record::CocktailStorageRecord,
//!     types::AppLocale,
//! };
//!
//! let catalog = StaticCatalog::new(CatalogData {
//!     cocktails: vec![CocktailStorageRecord {
//!         id: 42,
//!         name: "Negroni".to_string(),
//!         ..Default::default()
//!     }],
//!     ingredients: vec![],
//! });
//! let mut cache = BaselineCache::new(Arc::new(catalog), AppLocale::EnGb);
//! let baseline = cache.get();
//!
//! let mut state = baseline.to_state();
//! let mut renamed = state.cocktails().get(42).expect("baseline cocktail").as_ref().clone();
//! renamed.name = "Negroni Sbagliato".to_string();
//! state.update_cocktail(renamed).expect("update");
//!
//! let mut calculator = DeltaCalculator::new();
//! let dirty = state.take_dirty();
//! let delta = calculator.compute_delta(&state, &baseline, Some(&dirty));
//! let cocktails = delta.cocktails.expect("cocktail changes");
//! assert_eq!(cocktails.updated()[0].id, 42);
//! assert!(delta.ingredients.is_none());
//! ```
//!
//! Runtime usage with file storage:
//! ```no_run
//! use std::sync::Arc;
//!
//! use barsync::{
//!     catalog::StaticCatalog,
//!     config::EngineConfig,
//!     record::Cocktail,
//!     runtime::handle::InventoryHandle,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bundle = std::fs::read("catalog.json").expect("read catalog");
//! let catalog = StaticCatalog::from_json_slice(&bundle).expect("parse catalog");
//! let config = EngineConfig::from_json("").expect("config");
//! let handle = InventoryHandle::open(&config, Arc::new(catalog), None).expect("open");
//!
//! handle.load_on_start().await.expect("load");
//! handle.create_cocktail(Cocktail {
//!     id: 10_000,
//!     name: "House Sour".to_string(),
//!     ..Default::default()
//! }).await.expect("create");
//! handle.persist_now().await.expect("persist");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Bundled baseline catalog loading.
pub mod catalog;
/// Engine configuration.
pub mod config;
/// Baseline cache and live inventory state.
pub mod core;
/// Full-scan and incremental delta computation.
pub mod delta;
/// Storage drivers and the snapshot store.
pub mod persist;
/// Records, storage projections and normalization.
pub mod record;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Versioned snapshot documents.
pub mod snapshot;
/// Remote sync.
pub mod sync;
/// Shared primitive types and enums.
pub mod types;
