use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use crate::access::{
    MembershipProvider, Outcome, PermissionEvaluator, Predicate, RecordingPermissions,
    VisibilityResolver,
};
use crate::config::AccessConfig;
use crate::db::recordings::UploadSource;
use crate::db::{RecordingDatabase, SqliteMembership};
use crate::error::Result;
use crate::recording::filename_generation;
use crate::recording::lifecycle;
use crate::recording::mutation_guard::MutationGuard;
use crate::recording::processing::ProcessingQueue;
use crate::recording::query_engine::{QueryEngine, RecordingPage, RecordingQuery};
use crate::recording::types::{
    NewTag, OrderTerm, Recording, RecordingId, RecordingView, Tag, TagFilter, User,
};

/// Entry point for everything a caller does with recordings.
#[derive(Clone)]
pub struct RecordingService {
    config: Arc<AccessConfig>,
    queries: QueryEngine,
    mutations: MutationGuard,
    permissions: PermissionEvaluator,
    processing: ProcessingQueue,
}

impl RecordingService {
    pub fn new(
        database: &RecordingDatabase,
        membership: Arc<dyn MembershipProvider>,
        config: AccessConfig,
    ) -> Self {
        let config = Arc::new(config);
        let pool = database.pool().clone();

        let permissions = PermissionEvaluator::new(membership.clone());
        let queries = QueryEngine::new(
            pool.clone(),
            VisibilityResolver::new(membership),
            config.clone(),
        );
        let mutations = MutationGuard::new(pool.clone(), queries.clone(), permissions.clone());

        Self {
            config,
            queries,
            mutations,
            permissions,
            processing: ProcessingQueue::new(pool),
        }
    }

    /// Connect to `config.database_url` and answer membership from the same
    /// database. A global subscriber is only installed when
    /// `config.log_directive` is set.
    pub async fn open(config: AccessConfig) -> Result<Self> {
        if let Some(directive) = &config.log_directive {
            crate::log::init_tracing(directive);
        }

        let database = RecordingDatabase::new(&config).await?;
        let membership = Arc::new(SqliteMembership::new(database.pool().clone()));

        info!(
            "🚀 Recording service ready (file names in {})",
            config.display_timezone
        );
        Ok(Self::new(&database, membership, config))
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub async fn query(&self, user: &User, query: RecordingQuery) -> Result<RecordingPage> {
        self.queries.query(user, query).await
    }

    /// Positional form of [`query`](Self::query). `tagged_only` of `None`
    /// ignores tags, `Some(true)` keeps tagged recordings, `Some(false)`
    /// untagged ones.
    pub async fn query_with(
        &self,
        user: &User,
        filter: Predicate,
        tagged_only: Option<bool>,
        offset: i64,
        limit: Option<i64>,
        order: Option<Vec<OrderTerm>>,
    ) -> Result<RecordingPage> {
        let query = RecordingQuery {
            filter,
            tagged: TagFilter::from(tagged_only),
            offset,
            limit,
            order,
        };
        self.queries.query(user, query).await
    }

    pub async fn get_one(&self, user: &User, id: RecordingId) -> Result<Option<RecordingView>> {
        self.queries.get_one(user, id).await
    }

    pub async fn delete_one(&self, user: &User, id: RecordingId) -> Result<bool> {
        self.mutations.delete_one(user, id).await
    }

    pub async fn update_one(
        &self,
        user: &User,
        id: RecordingId,
        updates: &Map<String, Value>,
    ) -> Result<bool> {
        self.mutations.update_one(user, id, updates).await
    }

    pub async fn try_update_one(
        &self,
        user: &User,
        id: RecordingId,
        updates: &Map<String, Value>,
    ) -> Result<Outcome<()>> {
        self.mutations.try_update_one(user, id, updates).await
    }

    pub async fn create_from_input(
        &self,
        source: UploadSource,
        payload: &Map<String, Value>,
    ) -> Result<RecordingId> {
        self.mutations.create_from_input(source, payload).await
    }

    pub async fn tag_one(&self, user: &User, id: RecordingId, tag: NewTag) -> Result<Outcome<Tag>> {
        self.mutations.tag_one(user, id, tag).await
    }

    pub async fn get_user_permissions(
        &self,
        recording: &Recording,
        user: &User,
    ) -> Result<RecordingPermissions> {
        self.permissions.evaluate(user, recording).await
    }

    pub fn can_get_raw(&self, recording: &Recording) -> bool {
        lifecycle::can_get_raw(recording)
    }

    pub fn file_name(&self, recording: &Recording) -> String {
        filename_generation::file_name(recording, self.config.display_timezone)
    }

    pub fn raw_file_name(&self, recording: &Recording) -> String {
        filename_generation::raw_file_name(recording, self.config.display_timezone)
    }

    /// Queue used by transcoding workers.
    pub fn processing(&self) -> &ProcessingQueue {
        &self.processing
    }
}
