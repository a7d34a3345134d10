// Visibility-scoped recording queries
//
// Every read goes through here: the caller's filter is combined with the
// user's visibility predicate and the tag condition, then the page, its
// total count and the tags of the returned rows are read in one transaction.

use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::access::{Fragment, Predicate, VisibilityResolver};
use crate::config::AccessConfig;
use crate::db::recordings;
use crate::error::Result;
use crate::recording::types::{
    AttributeSet, OrderKey, OrderTerm, Recording, RecordingId, RecordingView, TagFilter, User,
};

/// A listing request
#[derive(Debug, Clone, Default)]
pub struct RecordingQuery {
    pub filter: Predicate,
    pub tagged: TagFilter,
    pub offset: i64,
    pub limit: Option<i64>,
    /// `None` uses the configured default order
    pub order: Option<Vec<OrderTerm>>,
}

impl RecordingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }

    pub fn tagged(mut self, tagged: impl Into<TagFilter>) -> Self {
        self.tagged = tagged.into();
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn order(mut self, order: Vec<OrderTerm>) -> Self {
        self.order = Some(order);
        self
    }
}

/// One page of results plus the number of matches across all pages
#[derive(Debug, Clone, Serialize)]
pub struct RecordingPage {
    pub rows: Vec<RecordingView>,
    pub count: i64,
}

/// Condition implementing a tag-presence filter.
pub fn tag_condition(tagged: TagFilter) -> Option<Predicate> {
    match tagged {
        TagFilter::Any => None,
        TagFilter::TaggedOnly => Some(Predicate::Fragment(Fragment::TagExists)),
        TagFilter::UntaggedOnly => Some(Predicate::Fragment(Fragment::NoTagExists)),
    }
}

/// `filter AND visibility AND tag condition`
pub fn compose_predicate(filter: Predicate, visibility: Predicate, tagged: TagFilter) -> Predicate {
    let predicate = filter.and(visibility);
    match tag_condition(tagged) {
        Some(condition) => predicate.and(condition),
        None => predicate,
    }
}

#[derive(Clone)]
pub struct QueryEngine {
    pool: SqlitePool,
    visibility: VisibilityResolver,
    config: Arc<AccessConfig>,
}

impl QueryEngine {
    pub fn new(pool: SqlitePool, visibility: VisibilityResolver, config: Arc<AccessConfig>) -> Self {
        Self {
            pool,
            visibility,
            config,
        }
    }

    /// Order actually applied for a request. Any order without an `id` term
    /// gets `id DESC` appended so pages never overlap.
    pub fn resolve_order(&self, requested: Option<&[OrderTerm]>) -> Vec<OrderTerm> {
        let mut order = match requested {
            Some(terms) if !terms.is_empty() => terms.to_vec(),
            _ => self.config.default_order.clone(),
        };
        if !order.iter().any(|term| term.key == OrderKey::Id) {
            order.push(OrderTerm::desc(OrderKey::Id));
        }
        order
    }

    pub async fn query(&self, user: &User, query: RecordingQuery) -> Result<RecordingPage> {
        // Membership may share this pool, so resolve it before opening the
        // read transaction.
        let visible = self.visibility.predicate_for(user).await?;
        let predicate = compose_predicate(query.filter, visible, query.tagged);
        let order = self.resolve_order(query.order.as_deref());
        let limit = self.config.effective_limit(query.limit);

        let mut tx = self.pool.begin().await?;
        let count = recordings::count_matching(&mut *tx, &predicate).await?;
        let rows = recordings::fetch_page(
            &mut *tx,
            AttributeSet::UserListing,
            &predicate,
            &order,
            query.offset,
            limit,
        )
        .await?;
        let ids: Vec<RecordingId> = rows.iter().map(|row| row.recording.id).collect();
        let mut tags = recordings::tags_for(&mut *tx, &ids).await?;
        tx.commit().await?;

        debug!(
            "Query for user {} matched {} recordings, returning {}",
            user.id,
            count,
            rows.len()
        );

        let rows = rows
            .into_iter()
            .map(|row| {
                let row_tags = tags.remove(&row.recording.id).unwrap_or_default();
                row.into_view(row_tags)
            })
            .collect();

        Ok(RecordingPage { rows, count })
    }

    /// A single visible recording, including its raw file key.
    pub async fn get_one(&self, user: &User, id: RecordingId) -> Result<Option<RecordingView>> {
        let visible = self.visibility.predicate_for(user).await?;

        let mut conn = self.pool.acquire().await?;
        let Some(row) =
            recordings::fetch_one(&mut conn, AttributeSet::UserSingle, id, &visible).await?
        else {
            debug!("Recording {} not visible to user {}", id, user.id);
            return Ok(None);
        };
        let mut tags = recordings::tags_for(&mut conn, &[id]).await?;

        Ok(Some(row.into_view(tags.remove(&id).unwrap_or_default())))
    }

    /// The recording alone, if `user` can see it.
    pub async fn visible_recording(&self, user: &User, id: RecordingId) -> Result<Option<Recording>> {
        let visible = self.visibility.predicate_for(user).await?;

        let mut conn = self.pool.acquire().await?;
        let row = recordings::fetch_one(&mut conn, AttributeSet::UserSingle, id, &visible).await?;
        Ok(row.map(|row| row.recording))
    }
}
