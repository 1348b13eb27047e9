mod common;

use std::{collections::BTreeSet, sync::Arc};

use proptest::prelude::*;

use barsync::{
    core::{baseline::Baseline, state::InventoryState},
    delta::{calculator::DeltaCalculator, compute_full_delta, DeltaResult, InventoryDelta},
    persist::{store::SnapshotStore, MemoryStorage},
    record::StorageRecord,
    snapshot::{build_snapshot, restore_state, Preferences, Snapshot},
    types::RecordId,
};

use common::{baseline, cocktail, ingredient};

#[derive(Debug, Clone)]
enum Action {
    CreateCocktail { id: RecordId, variant: u8 },
    UpdateCocktail { id: RecordId, variant: u8 },
    DeleteCocktail { id: RecordId },
    CreateIngredient { id: RecordId, variant: u8 },
    UpdateIngredient { id: RecordId, variant: u8 },
    DeleteIngredient { id: RecordId },
    Touch { id: RecordId },
    Check,
}

// Mixes baseline ids with fresh ones.
fn cocktail_id() -> impl Strategy<Value = RecordId> {
    prop_oneof![0i64..7, Just(42i64), 10_000i64..10_006]
}

fn ingredient_id() -> impl Strategy<Value = RecordId> {
    prop_oneof![99i64..105, 500i64..504]
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        (cocktail_id(), 0u8..4).prop_map(|(id, variant)| Action::CreateCocktail { id, variant }),
        (cocktail_id(), 0u8..4).prop_map(|(id, variant)| Action::UpdateCocktail { id, variant }),
        cocktail_id().prop_map(|id| Action::DeleteCocktail { id }),
        (ingredient_id(), 0u8..4)
            .prop_map(|(id, variant)| Action::CreateIngredient { id, variant }),
        (ingredient_id(), 0u8..4)
            .prop_map(|(id, variant)| Action::UpdateIngredient { id, variant }),
        ingredient_id().prop_map(|id| Action::DeleteIngredient { id }),
        cocktail_id().prop_map(|id| Action::Touch { id }),
        Just(Action::Check),
    ]
}

// Variant 0 reproduces the baseline content for baseline ids.
fn cocktail_name(id: RecordId, variant: u8) -> String {
    const NAMES: [&str; 6] = ["Negroni", "Martini", "Boulevardier", "Americano", "Gimlet", "Aviation"];
    let base = common::BASE_COCKTAIL_IDS
        .iter()
        .position(|&known| known == id)
        .map_or_else(|| format!("Custom {id}"), |idx| NAMES[idx].to_string());
    match variant {
        0 => base,
        n => format!("{base} v{n}"),
    }
}

fn ingredient_name(id: RecordId, variant: u8) -> String {
    const NAMES: [&str; 4] = ["Gin", "Campari", "Sweet Vermouth", "Old Tom Gin"];
    let base = common::BASE_INGREDIENT_IDS
        .iter()
        .position(|&known| known == id)
        .map_or_else(|| format!("Ingredient {id}"), |idx| NAMES[idx].to_string());
    match variant {
        0 => base,
        n => format!("{base} v{n}"),
    }
}

fn apply(state: &mut InventoryState, action: &Action) {
    // Rejected mutations are part of the input space.
    let _ = match *action {
        Action::CreateCocktail { id, variant } => state
            .create_cocktail(cocktail(id, &cocktail_name(id, variant)))
            .map(drop),
        Action::UpdateCocktail { id, variant } => {
            state.update_cocktail(cocktail(id, &cocktail_name(id, variant)))
        }
        Action::DeleteCocktail { id } => state.delete_cocktail(id),
        Action::CreateIngredient { id, variant } => state
            .create_ingredient(ingredient(id, &ingredient_name(id, variant)))
            .map(drop),
        Action::UpdateIngredient { id, variant } => {
            state.update_ingredient(ingredient(id, &ingredient_name(id, variant)))
        }
        Action::DeleteIngredient { id } => state.delete_ingredient(id),
        Action::Touch { id } => {
            state.mark_dirty(barsync::types::RecordKind::Cocktail, id);
            Ok(())
        }
        Action::Check => Ok(()),
    };
}

fn assert_well_formed<S: StorageRecord>(result: &DeltaResult<S>) {
    let created: Vec<RecordId> = result.created().iter().map(StorageRecord::id).collect();
    let updated: Vec<RecordId> = result.updated().iter().map(StorageRecord::id).collect();
    let deleted = result.deleted_ids().to_vec();

    for bucket in [&created, &updated, &deleted] {
        assert!(bucket.windows(2).all(|pair| pair[0] < pair[1]), "sorted, unique: {bucket:?}");
    }
    let all: BTreeSet<RecordId> = created.iter().chain(&updated).chain(&deleted).copied().collect();
    assert_eq!(all.len(), created.len() + updated.len() + deleted.len(), "buckets overlap");
    assert!(
        result.created.as_ref().is_none_or(|v| !v.is_empty())
            && result.updated.as_ref().is_none_or(|v| !v.is_empty())
            && result.deleted_ids.as_ref().is_none_or(|v| !v.is_empty()),
        "empty buckets are omitted"
    );
    assert!(!all.is_empty(), "empty results are omitted");
}

fn check_delta(delta: &InventoryDelta, base: &Baseline) {
    if let Some(cocktails) = &delta.cocktails {
        assert_well_formed(cocktails);
        for id in cocktails.created().iter().map(|c| c.id) {
            assert!(!base.cocktails.contains(id));
        }
        for id in cocktails.updated().iter().map(|c| c.id).chain(cocktails.deleted_ids().iter().copied()) {
            assert!(base.cocktails.contains(id));
        }
    }
    if let Some(ingredients) = &delta.ingredients {
        assert_well_formed(ingredients);
    }
}

fn replay(base: &Arc<Baseline>, actions: &[Action]) -> InventoryState {
    let mut state = base.to_state();
    for action in actions {
        apply(&mut state, action);
    }
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn incremental_delta_matches_full_scan(actions in prop::collection::vec(action_strategy(), 1..60)) {
        let base = baseline();
        let mut state = base.to_state();
        let mut calc = DeltaCalculator::new();

        for action in &actions {
            apply(&mut state, action);
            if matches!(action, Action::Check) {
                let dirty = state.take_dirty();
                let incremental = calc.compute_delta(&state, &base, Some(&dirty));
                let full = compute_full_delta(&state, &base);
                prop_assert_eq!(&incremental, &full);
                check_delta(&full, &base);
            }
        }

        let dirty = state.take_dirty();
        prop_assert_eq!(
            calc.compute_delta(&state, &base, Some(&dirty)),
            compute_full_delta(&state, &base)
        );
    }

    #[test]
    fn persisted_state_reloads_identically(actions in prop::collection::vec(action_strategy(), 0..40), imported in any::<bool>()) {
        let base = baseline();
        let mut state = replay(&base, &actions);
        state.set_imported(imported);

        let store = SnapshotStore::new(Arc::new(MemoryStorage::new()), "inventory-state.json");
        store.save(&state, &base, &Preferences::default(), Some(1)).expect("save");
        let loaded = store.load(&base);
        prop_assert!(loaded.state.same_records(&state));
        prop_assert_eq!(loaded.state.imported(), imported);
    }

    #[test]
    fn restore_of_a_built_snapshot_is_lossless(actions in prop::collection::vec(action_strategy(), 0..40)) {
        let base = baseline();
        let state = replay(&base, &actions);
        let snapshot = build_snapshot(&state, &base, &Preferences::default(), None);

        let bytes = snapshot.to_vec().expect("encode");
        let parsed = Snapshot::from_slice(&bytes).expect("decode");
        prop_assert_eq!(&parsed, &snapshot);

        let restored = restore_state(&parsed, &base);
        prop_assert!(restored.same_records(&state));
        prop_assert_eq!(compute_full_delta(&restored, &base), compute_full_delta(&state, &base));
    }
}
