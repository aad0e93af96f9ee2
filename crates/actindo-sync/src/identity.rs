//! # Identity Resolution
//!
//! Maps the hub's order numbers to storefront article ids and back.
//!
//! ```text
//! resolve_article_id("SHIRT-RED-M")
//!     1. request cache
//!     2. detail with that number      → its article
//!     3. article with that master no. → that article
//!     4. NotFound("Could not find article with this ordernumber: …")
//!
//! external_number(article)
//!     plain article   → main detail number
//!     variant family  → stored master number, derived and persisted if absent
//! ```

use std::collections::BTreeMap;
use tracing::debug;

use actindo_core::identity::{master_candidate, MASTER_SUFFIX};
use actindo_store::Article;

use crate::context::RequestContext;
use crate::error::{SyncError, SyncResult};

/// Resolves an order number to an article id.
pub async fn resolve_article_id(ctx: &RequestContext, number: &str) -> SyncResult<i64> {
    if let Some(id) = ctx.article_ids.lock().await.get(number) {
        return Ok(*id);
    }

    let gateway = ctx.gateway();
    let found = match gateway.detail_by_number(number).await? {
        Some(detail) => Some(detail.article_id),
        None => gateway.article_by_master_number(number).await?,
    };

    match found {
        Some(id) => {
            ctx.article_ids.lock().await.insert(number.to_string(), id);
            Ok(id)
        }
        None => Err(SyncError::not_found(format!(
            "Could not find article with this ordernumber: {number}"
        ))),
    }
}

/// Drops a cached resolution (after a delete or a renumbering).
pub async fn forget(ctx: &RequestContext, number: &str) {
    ctx.article_ids.lock().await.remove(number);
}

/// The number the hub knows an article by.
pub async fn external_number(ctx: &RequestContext, article: &Article) -> SyncResult<String> {
    if article.is_variant_family() {
        return master_number(ctx, article).await;
    }
    let detail = ctx.gateway().detail(article.main_detail_id).await?;
    Ok(detail.number)
}

/// External numbers for many articles at once.
pub async fn external_numbers(
    ctx: &RequestContext,
    articles: &[Article],
) -> SyncResult<BTreeMap<i64, String>> {
    let mut numbers = BTreeMap::new();
    for article in articles {
        numbers.insert(article.id, external_number(ctx, article).await?);
    }
    Ok(numbers)
}

/// Stored master number of a variant family, derived and persisted when
/// missing.
pub async fn master_number(ctx: &RequestContext, article: &Article) -> SyncResult<String> {
    if let Some(number) = article.master_number.as_deref().filter(|n| !n.is_empty()) {
        return Ok(number.to_string());
    }

    let gateway = ctx.gateway();
    let siblings: Vec<String> = gateway
        .details(article.id)
        .await?
        .into_iter()
        .map(|d| d.number)
        .collect();

    let mut number = master_candidate(&siblings).ok_or_else(|| {
        SyncError::conflict(format!("article {} has no details to number", article.id))
    })?;
    while gateway.detail_by_number(&number).await?.is_some() {
        number.push_str(MASTER_SUFFIX);
    }

    gateway.set_master_number(article.id, &number).await?;
    debug!(article_id = %article.id, number = %number, "Persisted master number");
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::context;
    use actindo_store::{ArticleDetail, CatalogGateway, ConfiguratorSet, Snapshot};

    fn detail(id: i64, article_id: i64, number: &str, is_main: bool) -> ArticleDetail {
        ArticleDetail {
            id,
            article_id,
            number: number.into(),
            is_main,
            ..ArticleDetail::default()
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            articles: vec![
                Article { id: 1, main_detail_id: 10, ..Article::default() },
                Article {
                    id: 2,
                    main_detail_id: 20,
                    configurator_set: Some(ConfiguratorSet::default()),
                    ..Article::default()
                },
                Article {
                    id: 3,
                    main_detail_id: 30,
                    master_number: Some("BAG".into()),
                    configurator_set: Some(ConfiguratorSet::default()),
                    ..Article::default()
                },
            ],
            details: vec![
                detail(10, 1, "SHIRT", true),
                detail(20, 2, "SHIRT-RED", true),
                detail(21, 2, "SHIRT-BLUE", false),
                detail(30, 3, "BAG-S", true),
            ],
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn test_resolves_detail_then_master_number() {
        let (_, ctx) = context(snapshot());
        assert_eq!(resolve_article_id(&ctx, "SHIRT-BLUE").await.unwrap(), 2);
        assert_eq!(resolve_article_id(&ctx, "BAG").await.unwrap(), 3);

        let err = resolve_article_id(&ctx, "NOPE").await.unwrap_err();
        assert_eq!(err.to_string(), "Could not find article with this ordernumber: NOPE");
    }

    #[tokio::test]
    async fn test_master_number_avoids_taken_numbers() {
        let (store, ctx) = context(snapshot());
        let family = store.article(2).await.unwrap();

        // common prefix "SHIRT-" → "SHIRT", but article 1 owns that number
        let number = external_number(&ctx, &family).await.unwrap();
        assert_eq!(number, "SHIRT-hauptartikel");
        assert_eq!(
            store.article(2).await.unwrap().master_number.as_deref(),
            Some("SHIRT-hauptartikel")
        );
    }

    #[tokio::test]
    async fn test_plain_article_uses_main_detail() {
        let (store, ctx) = context(snapshot());
        let articles = store.articles().await.unwrap();
        let numbers = external_numbers(&ctx, &articles).await.unwrap();
        assert_eq!(numbers[&1], "SHIRT");
        assert_eq!(numbers[&3], "BAG");
    }
}
