//! # Category Tree Synchronization
//!
//! `category.get` and `category.action`. The tree is loaded into a
//! [`CategoryTree`] arena for every call; mutations go to the arena first and
//! only the placements that actually changed are written back.
//!
//! ## Action Flow
//! ```text
//! category.action(action, categoryID, parentID, referenceID, data)
//!     │
//!     ├── add         parent < 1 → root, appended last      → {ok, id}
//!     ├── textchange  name decoded, default language         → {ok}
//!     ├── delete      subtree cascade, gap closed            → {ok}
//!     │               (unknown id is not an error)
//!     └── above/below/append
//!             append: reference = parentID
//!             tree.move_node(...) → dirty placements
//!             save_placements in chunks, flush after each    → {ok}
//! ```

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use actindo_core::order::decode_special_chars;
use actindo_core::wire::entries;
use actindo_core::{CategoryAction, CategoryTree, Placement, ROOT_CATEGORY_ID};

use crate::context::RequestContext;
use crate::error::{SyncError, SyncResult};

/// Loads the storefront's categories into an arena.
pub async fn load_tree(ctx: &RequestContext) -> SyncResult<CategoryTree> {
    let records = ctx.gateway().categories().await?;
    Ok(CategoryTree::build(records)?)
}

// =============================================================================
// Export
// =============================================================================

/// `category.get`: the tree without its root, once per language.
pub async fn get(ctx: &RequestContext) -> SyncResult<Value> {
    let tree = load_tree(ctx).await?;
    let nodes = children_of(&tree, tree.root());

    let mut categories = Map::new();
    for language in ctx.languages().await? {
        categories.insert(language.id.to_string(), Value::Object(nodes.clone()));
    }

    Ok(json!({ "ok": true, "categories": categories }))
}

fn children_of(tree: &CategoryTree, id: i64) -> Map<String, Value> {
    tree.children(id)
        .iter()
        .filter_map(|child| tree.get(*child))
        .map(|node| {
            (
                node.id.to_string(),
                json!({
                    "categories_id": node.id,
                    "parent_id": node.parent_id.unwrap_or_default(),
                    "categories_name": node.name,
                    "children": children_of(tree, node.id),
                }),
            )
        })
        .collect()
}

// =============================================================================
// Actions
// =============================================================================

/// `category.action`.
pub async fn action(
    ctx: &RequestContext,
    action: &str,
    category_id: i64,
    parent_id: i64,
    reference_id: i64,
    data: &Value,
) -> SyncResult<Value> {
    let action: CategoryAction = action.parse()?;
    let mut tree = load_tree(ctx).await?;

    match action {
        CategoryAction::Add => {
            let parent = if parent_id < 1 { ROOT_CATEGORY_ID } else { parent_id };
            let name = category_name(ctx, data).await?;
            if !tree.contains(parent) {
                return Err(SyncError::not_found(format!(
                    "Parent category {parent} was not found"
                )));
            }
            let position = tree.children(parent).len() as i64;
            let id = ctx.gateway().create_category(parent, &name, position).await?;
            tree.insert(id, parent, name)?;
            ctx.gateway().flush().await?;
            info!(category_id = %id, parent_id = %parent, "Created category");
            Ok(json!({ "ok": true, "id": id }))
        }
        CategoryAction::TextChange => {
            let name = decode_special_chars(&category_name(ctx, data).await?);
            tree.rename(category_id, name.clone())?;
            ctx.gateway().rename_category(category_id, &name).await?;
            ctx.gateway().flush().await?;
            Ok(json!({ "ok": true }))
        }
        CategoryAction::Delete => {
            if !tree.contains(category_id) {
                debug!(category_id = %category_id, "Category already gone");
                return Ok(json!({ "ok": true }));
            }
            let removed = tree.remove(category_id)?;
            ctx.gateway().delete_category(category_id).await?;
            save_placements(ctx, &tree.dirty_placements()).await?;
            info!(category_id = %category_id, removed = removed.len(), "Deleted category");
            Ok(json!({ "ok": true }))
        }
        CategoryAction::Above | CategoryAction::Below | CategoryAction::Append => {
            let placement = action
                .placement()
                .ok_or_else(|| SyncError::validation("not a move action"))?;
            let reference = if action == CategoryAction::Append {
                parent_id
            } else {
                reference_id
            };
            let changed = tree.move_node(category_id, placement, reference, parent_id)?;
            save_placements(ctx, &changed).await?;
            tree.mark_clean();
            info!(
                category_id = %category_id,
                reference = %reference,
                changed = changed.len(),
                "Moved category"
            );
            Ok(json!({ "ok": true }))
        }
    }
}

/// Writes placements in chunks, flushing after each chunk.
pub(crate) async fn save_placements(
    ctx: &RequestContext,
    placements: &[Placement],
) -> SyncResult<()> {
    let gateway = ctx.gateway();
    for chunk in placements.chunks(ctx.config().batch.chunk_size.max(1)) {
        gateway.save_placements(chunk).await?;
        gateway.flush().await?;
    }
    Ok(())
}

/// `data.description[<default language id>].name`, falling back to the
/// first description that carries a name.
async fn category_name(ctx: &RequestContext, data: &Value) -> SyncResult<String> {
    let description = data.get("description").unwrap_or(&Value::Null);
    let default_id = ctx.default_language().await?.map(|l| l.id.to_string());

    let name = default_id
        .and_then(|id| description.get(id.as_str()))
        .and_then(|d| d.get("name"))
        .and_then(Value::as_str)
        .or_else(|| {
            entries(description)
                .into_iter()
                .find_map(|d| d.get("name").and_then(Value::as_str))
        })
        .unwrap_or_default()
        .trim()
        .to_string();

    if name.is_empty() {
        return Err(SyncError::validation("category name missing"));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{context, shop};
    use actindo_core::CategoryRecord;
    use actindo_store::Snapshot;

    fn record(id: i64, parent: Option<i64>, name: &str, position: i64) -> CategoryRecord {
        CategoryRecord { id, parent_id: parent, name: name.into(), position }
    }

    /// ```text
    /// 1 Root
    /// ├── 2 Kleidung
    /// │   ├── 4 Hemden
    /// │   └── 5 Hosen
    /// └── 3 Taschen
    /// ```
    fn snapshot() -> Snapshot {
        Snapshot {
            shops: vec![shop(1, 1, "de_DE", true), shop(2, 2, "en_GB", false)],
            categories: vec![
                record(1, None, "Root", 0),
                record(2, Some(1), "Kleidung", 0),
                record(3, Some(1), "Taschen", 1),
                record(4, Some(2), "Hemden", 0),
                record(5, Some(2), "Hosen", 1),
            ],
            ..Snapshot::default()
        }
    }

    fn position(snapshot: &Snapshot, id: i64) -> (Option<i64>, i64) {
        let r = snapshot.categories.iter().find(|c| c.id == id).unwrap();
        (r.parent_id, r.position)
    }

    #[tokio::test]
    async fn test_tree_is_repeated_per_language() {
        let (_, ctx) = context(snapshot());
        let result = get(&ctx).await.unwrap();

        let german = &result["categories"]["1"];
        assert_eq!(german, &result["categories"]["2"]);
        assert_eq!(german["2"]["categories_name"], "Kleidung");
        assert_eq!(german["2"]["children"]["5"]["parent_id"], 2);
        assert!(german.get("1").is_none());
    }

    #[tokio::test]
    async fn test_two_roots_are_rejected() {
        let mut snap = snapshot();
        snap.categories.push(record(9, None, "Zweite Wurzel", 0));
        let (_, ctx) = context(snap);

        let err = get(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Multiple Roots found! Not allowed");
    }

    #[tokio::test]
    async fn test_add_appends_under_root_when_no_parent() {
        let (store, ctx) = context(snapshot());
        let data = json!({"description": {"1": {"name": "Schuhe"}}});

        let result = action(&ctx, "add", 0, 0, 0, &data).await.unwrap();
        let id = result["id"].as_i64().unwrap();

        let snap = store.snapshot().await;
        assert_eq!(position(&snap, id), (Some(1), 2));
    }

    #[tokio::test]
    async fn test_textchange_decodes_entities() {
        let (store, ctx) = context(snapshot());
        let data = json!({"description": {"1": {"name": "Hemden &amp; Blusen"}}});

        action(&ctx, "TextChange", 4, 0, 0, &data).await.unwrap();
        let snap = store.snapshot().await;
        let name = &snap.categories.iter().find(|c| c.id == 4).unwrap().name;
        assert_eq!(name, "Hemden & Blusen");
    }

    #[tokio::test]
    async fn test_move_above_reorders_siblings() {
        let (store, ctx) = context(snapshot());

        action(&ctx, "above", 3, 1, 2, &Value::Null).await.unwrap();

        let snap = store.snapshot().await;
        assert_eq!(position(&snap, 3), (Some(1), 0));
        assert_eq!(position(&snap, 2), (Some(1), 1));
        assert!(store.flush_count() > 0);
    }

    #[tokio::test]
    async fn test_append_uses_parent_as_reference() {
        let (store, ctx) = context(snapshot());

        action(&ctx, "append", 3, 2, 0, &Value::Null).await.unwrap();

        let snap = store.snapshot().await;
        assert_eq!(position(&snap, 3), (Some(2), 2));
    }

    #[tokio::test]
    async fn test_move_below_own_subtree_is_a_conflict() {
        let (_, ctx) = context(snapshot());
        let err = action(&ctx, "append", 2, 4, 0, &Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_delete_closes_gap_and_ignores_unknown_ids() {
        let (store, ctx) = context(snapshot());

        action(&ctx, "delete", 2, 0, 0, &Value::Null).await.unwrap();
        action(&ctx, "delete", 77, 0, 0, &Value::Null).await.unwrap();

        let snap = store.snapshot().await;
        assert_eq!(position(&snap, 3), (Some(1), 0));
        assert!(!snap.categories.iter().any(|c| c.id == 4));
    }

    #[tokio::test]
    async fn test_unknown_action_is_a_validation_error() {
        let (_, ctx) = context(snapshot());
        let err = action(&ctx, "explode", 2, 0, 0, &Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
