use std::cmp::Ordering;
use std::marker::PhantomData;

use tracing::debug;

use dynalinq_core::cache::{CacheQuery, CacheScope, TableCache};
use dynalinq_core::query::{
    translate, Condition, ConditionSet, FilterExpr, QueryDescription, QueryError, Reduction,
    ScalarOp, TranslationResult,
};
use dynalinq_core::schema::{SchemaError, TableDefinition};
use dynalinq_core::store::{GetRequest, QueryRequest, ReadOptions, ScanRequest};
use dynalinq_core::{
    select_plan, Document, Entity, EntityKey, Error, QueryPlan, Result, Value,
};

use super::DataContext;

/// What a query returns, depending on its reduction and projection.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput<E> {
    Entities(Vec<E>),
    /// Rows of a query with a `select` projection. Projected rows are not
    /// tracked.
    Documents(Vec<Document>),
    Count(usize),
    /// Result of `any` and `all`.
    Flag(bool),
    Entity(E),
    Document(Document),
}

/// A typed handle over one declared table, bound to its context.
pub struct Table<'a, E: Entity> {
    context: &'a DataContext,
    definition: TableDefinition,
    partition: Option<Value>,
    cache: Box<dyn TableCache>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> Table<'a, E> {
    pub(crate) async fn open(
        context: &'a DataContext,
        definition: TableDefinition,
        partition: Option<Value>,
    ) -> Result<Self> {
        let descriptor = E::descriptor();
        let mut scope = CacheScope::new(definition.name.clone(), descriptor.type_name())
            .with_version_field(descriptor.version_field())
            .with_ttl(definition.cache_ttl);
        if let Some(hash) = &partition {
            scope = scope.with_partition(hash.clone());
        }
        let mut cache = context.caches().create();
        cache.initialize(scope).await?;

        Ok(Self {
            context,
            definition,
            partition,
            cache,
            _entity: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    pub fn partition(&self) -> Option<&Value> {
        self.partition.as_ref()
    }

    /// The access path a query would take. No I/O.
    pub fn explain(&self, description: &QueryDescription) -> Result<QueryPlan> {
        let (_, conditions) = self.translate(description)?;
        Ok(select_plan(&conditions, &self.definition.key_schema))
    }

    fn translate(&self, description: &QueryDescription) -> Result<(TranslationResult, ConditionSet)> {
        let translation = translate(description, E::descriptor())?;
        let conditions = match &self.partition {
            Some(hash) => {
                let mut scoped = ConditionSet::new().with(Condition::equal(
                    self.definition.key_schema.hash_key_name(),
                    hash.clone(),
                ));
                for condition in translation.conditions.iter() {
                    scoped.push(condition.clone());
                }
                scoped
            }
            None => translation.conditions.clone(),
        };
        Ok((translation, conditions))
    }

    /// Runs a query. Translation errors surface before any store or cache
    /// access.
    pub async fn execute(&self, description: &QueryDescription) -> Result<QueryOutput<E>> {
        let (translation, conditions) = self.translate(description)?;
        let plan = select_plan(&conditions, &self.definition.key_schema);
        let options = description.read_options();
        debug!(table = %self.definition.name, plan = %plan, "Executing query");

        let mut query = CacheQuery::new(conditions)
            .with_custom_filter(translation.custom_filter.clone())
            .with_limit(options.limit);
        if let Some(field) = &translation.order_by_field {
            query = query.ordered_by(field.clone(), translation.effective_desc());
        }

        let use_cache = !options.consistent_read;
        let is_point_get = matches!(plan, QueryPlan::PointGet { .. });
        if use_cache && !is_point_get && translation.reduction_op() == Some(ScalarOp::Count) {
            if let Some(count) = self.cache.get_count(&query).await? {
                return Ok(QueryOutput::Count(count));
            }
        }

        let rows = self.rows(&plan, &query, &options).await?;
        self.reduce(rows, &translation)
    }

    async fn rows(
        &self,
        plan: &QueryPlan,
        query: &CacheQuery,
        options: &ReadOptions,
    ) -> Result<Vec<(EntityKey, Document)>> {
        let use_cache = !options.consistent_read;

        if let QueryPlan::PointGet { key, residual } = plan {
            let Some(document) = self.load_by_key(key, use_cache).await? else {
                return Ok(Vec::new());
            };
            let keep = residual.matches(&document)
                && passes_custom_filter(query.custom_filter.as_ref(), &document)?;
            return Ok(if keep {
                vec![(key.clone(), document)]
            } else {
                Vec::new()
            });
        }

        if use_cache {
            if let Some(entries) = self.cache.get_entities(query).await? {
                return Ok(entries.into_iter().map(|e| (e.key, e.document)).collect());
            }
        }

        // Started before the read so a commit landing mid-read drops the build.
        let builder = if use_cache {
            Some(self.cache.start_creating_index(query).await?)
        } else {
            None
        };

        let documents = self.read_store(plan, query, options).await?;
        let schema = &self.definition.key_schema;
        let mut rows = documents
            .into_iter()
            .map(|document| -> Result<(EntityKey, Document)> {
                let key = schema.key_of(&self.definition.name, &document)?;
                Ok((key, document))
            })
            .collect::<Result<Vec<_>>>()?;
        sort_rows(&mut rows, query);

        if let Some(mut builder) = builder {
            for (key, document) in &rows {
                builder.add_entity(key, document);
            }
            builder.commit().await?;
        }
        Ok(rows)
    }

    async fn read_store(
        &self,
        plan: &QueryPlan,
        query: &CacheQuery,
        options: &ReadOptions,
    ) -> Result<Vec<Document>> {
        let store = self.context.store();
        let schema = &self.definition.key_schema;

        let documents = match plan {
            QueryPlan::PointGet { key, .. } => store
                .get_item(&GetRequest {
                    table: self.definition.name.clone(),
                    key: key.clone(),
                    consistent_read: options.consistent_read,
                })
                .await?
                .into_iter()
                .collect(),
            QueryPlan::PrimaryQuery {
                hash_condition,
                range_conditions,
                local_index,
                residual,
            } => {
                let range_key = match local_index {
                    Some(name) => schema.local_index(name).map(|i| i.range_key.name.as_str()),
                    None => schema.range_key_name(),
                };
                let request = self.query_request(
                    local_index.clone(),
                    hash_condition,
                    range_conditions,
                    residual,
                    range_key,
                    query,
                    options,
                );
                store.query(&request).await?
            }
            QueryPlan::IndexQuery {
                index_name,
                hash_condition,
                range_conditions,
                residual,
            } => {
                let range_key = schema
                    .global_index(index_name)
                    .and_then(|i| i.range_key.as_ref())
                    .map(|k| k.name.as_str());
                let request = self.query_request(
                    Some(index_name.clone()),
                    hash_condition,
                    range_conditions,
                    residual,
                    range_key,
                    query,
                    options,
                );
                store.query(&request).await?
            }
            QueryPlan::Scan { filter } => {
                store
                    .scan(&ScanRequest {
                        table: self.definition.name.clone(),
                        filter: filter.clone(),
                        custom_filter: query.custom_filter.clone(),
                        options: options.clone(),
                    })
                    .await?
            }
        };
        Ok(documents)
    }

    /// The first range condition becomes the key condition; the others join
    /// the residual filter.
    #[allow(clippy::too_many_arguments)]
    fn query_request(
        &self,
        index_name: Option<String>,
        hash_condition: &Condition,
        range_conditions: &ConditionSet,
        residual: &ConditionSet,
        range_key: Option<&str>,
        query: &CacheQuery,
        options: &ReadOptions,
    ) -> QueryRequest {
        let mut range = range_conditions.iter();
        let range_condition = range.next().cloned();
        let mut filter = ConditionSet::new();
        for condition in range.chain(residual.iter()) {
            filter.push(condition.clone());
        }

        let descending_on_range =
            query.order_desc && range_key.is_some() && query.order_by.as_deref() == range_key;

        QueryRequest {
            table: self.definition.name.clone(),
            index_name,
            hash_condition: hash_condition.clone(),
            range_condition,
            filter,
            custom_filter: query.custom_filter.clone(),
            scan_forward: !descending_on_range,
            options: options.clone(),
        }
    }

    async fn load_by_key(&self, key: &EntityKey, use_cache: bool) -> Result<Option<Document>> {
        if use_cache {
            if let Some(entry) = self.cache.get_single_entity(key).await? {
                return Ok(Some(entry.document));
            }
        }

        let request = GetRequest {
            table: self.definition.name.clone(),
            key: key.clone(),
            consistent_read: !use_cache,
        };
        let document = self.context.store().get_item(&request).await?;
        if let Some(document) = &document {
            self.cache.put_single_loaded_entity(key, document).await?;
        }
        Ok(document)
    }

    fn reduce(
        &self,
        rows: Vec<(EntityKey, Document)>,
        translation: &TranslationResult,
    ) -> Result<QueryOutput<E>> {
        let entity_type = E::descriptor().type_name();

        let Some(Reduction {
            op,
            all_conditions,
        }) = &translation.reduction
        else {
            if translation.projection.is_some() {
                return Ok(QueryOutput::Documents(
                    rows.into_iter()
                        .map(|(_, document)| translation.project(document))
                        .collect(),
                ));
            }
            return Ok(QueryOutput::Entities(self.materialize(rows)?));
        };

        match op {
            ScalarOp::Count => Ok(QueryOutput::Count(rows.len())),
            ScalarOp::Any => Ok(QueryOutput::Flag(!rows.is_empty())),
            ScalarOp::All => Ok(QueryOutput::Flag(rows.iter().all(|(_, document)| {
                all_conditions
                    .as_ref()
                    .map_or(true, |conditions| conditions.matches(document))
            }))),
            ScalarOp::Single | ScalarOp::First | ScalarOp::Last => {
                if *op == ScalarOp::Single && rows.len() > 1 {
                    return Err(Error::MultipleResults {
                        entity_type,
                        count: rows.len(),
                    });
                }
                // Ordered queries already come reversed for `Last`.
                let row = if *op == ScalarOp::Last && translation.order_by_field.is_none() {
                    rows.into_iter().last()
                } else {
                    rows.into_iter().next()
                };
                let (key, document) = row.ok_or_else(|| Error::NotFound {
                    entity_type,
                    key: format!("[{}]", translation.conditions),
                })?;

                if translation.projection.is_some() {
                    return Ok(QueryOutput::Document(translation.project(document)));
                }
                let mut entities = self.materialize(vec![(key, document)])?;
                match entities.pop() {
                    Some(entity) => Ok(QueryOutput::Entity(entity)),
                    None => Err(Error::NotFound {
                        entity_type,
                        key: format!("[{}]", translation.conditions),
                    }),
                }
            }
        }
    }

    /// Registers rows with the tracker and builds entities from the copies
    /// the context sees.
    fn materialize(&self, rows: Vec<(EntityKey, Document)>) -> Result<Vec<E>> {
        let descriptor = E::descriptor();
        let current = self.context.with_tracker::<E, _>(&self.definition, |tracker| {
            rows.into_iter()
                .map(|(key, document)| tracker.track_loaded(key, document))
                .collect::<Vec<_>>()
        });
        current
            .iter()
            .map(|document| descriptor.from_document(document).map_err(Error::from))
            .collect()
    }

    /// Runs a query that returns entities.
    pub async fn to_vec(&self, description: &QueryDescription) -> Result<Vec<E>> {
        match self.execute(description).await? {
            QueryOutput::Entities(entities) => Ok(entities),
            other => Err(unexpected("entities", &other)),
        }
    }

    /// Runs a query with a `select` projection.
    pub async fn select(&self, description: &QueryDescription) -> Result<Vec<Document>> {
        match self.execute(description).await? {
            QueryOutput::Documents(documents) => Ok(documents),
            other => Err(unexpected("projected rows", &other)),
        }
    }

    pub async fn count(&self, description: QueryDescription) -> Result<usize> {
        match self.execute(&description.count()).await? {
            QueryOutput::Count(count) => Ok(count),
            other => Err(unexpected("a count", &other)),
        }
    }

    pub async fn any(&self, description: QueryDescription) -> Result<bool> {
        match self.execute(&description.any()).await? {
            QueryOutput::Flag(flag) => Ok(flag),
            other => Err(unexpected("a flag", &other)),
        }
    }

    pub async fn first(&self, description: QueryDescription) -> Result<E> {
        match self.execute(&description.first()).await? {
            QueryOutput::Entity(entity) => Ok(entity),
            other => Err(unexpected("an entity", &other)),
        }
    }

    pub async fn single(&self, description: QueryDescription) -> Result<E> {
        match self.execute(&description.single()).await? {
            QueryOutput::Entity(entity) => Ok(entity),
            other => Err(unexpected("an entity", &other)),
        }
    }

    /// Point lookup by key values: the hash value, then the range value for
    /// tables with a range key.
    pub async fn find(&self, key_values: &[Value]) -> Result<E> {
        let key = self.key_from_values(key_values)?;
        let document = self.load_tracked(&key).await?;
        Ok(E::descriptor().from_document(&document)?)
    }

    fn key_from_values(&self, key_values: &[Value]) -> Result<EntityKey> {
        Ok(self
            .definition
            .key_schema
            .key_from_values(&self.definition.name, key_values)?)
    }

    async fn load_tracked(&self, key: &EntityKey) -> Result<Document> {
        let not_found = || Error::NotFound {
            entity_type: E::descriptor().type_name(),
            key: key.to_string(),
        };
        if let Some(partition) = &self.partition {
            if !key.hash().loosely_equals(partition) {
                return Err(not_found());
            }
        }

        let tracked = self
            .context
            .with_tracker::<E, _>(&self.definition, |tracker| tracker.current(key).cloned());
        if let Some(document) = tracked {
            return Ok(document);
        }

        let document = self.load_by_key(key, true).await?.ok_or_else(not_found)?;
        Ok(self
            .context
            .with_tracker::<E, _>(&self.definition, |tracker| {
                tracker.track_loaded(key.clone(), document)
            }))
    }

    fn key_of(&self, document: &Document) -> Result<EntityKey> {
        let key = self
            .definition
            .key_schema
            .key_of(&self.definition.name, document)?;
        if let Some(partition) = &self.partition {
            if !key.hash().loosely_equals(partition) {
                return Err(SchemaError::KeySchemaMismatch {
                    table: self.definition.name.clone(),
                    reason: format!("key {key} is outside partition {partition}"),
                }
                .into());
            }
        }
        Ok(key)
    }

    /// Stages an insert. Fails with a duplicate key error when the key is
    /// already staged or loaded in this context.
    pub fn insert_on_submit(&self, entity: &E) -> Result<()> {
        let document = E::descriptor().to_document(entity);
        let key = self.key_of(&document)?;
        self.context
            .with_tracker::<E, _>(&self.definition, |tracker| {
                tracker.stage_insert(key, document)
            })?;
        Ok(())
    }

    /// Stages a delete. Removing an entity staged for insert cancels the
    /// insert.
    pub fn remove_on_submit(&self, entity: &E) -> Result<()> {
        let document = E::descriptor().to_document(entity);
        let key = self.key_of(&document)?;
        self.context
            .with_tracker::<E, _>(&self.definition, |tracker| tracker.stage_remove(key));
        Ok(())
    }

    /// Replaces the tracked copy of a loaded entity. Unchanged entities
    /// stage nothing.
    pub fn update_on_submit(&self, entity: &E) -> Result<()> {
        let document = E::descriptor().to_document(entity);
        let key = self.key_of(&document)?;
        self.context
            .with_tracker::<E, _>(&self.definition, |tracker| {
                tracker.replace_current(&key, document)
            })?;
        Ok(())
    }

    /// Loads an entity (or takes the tracked copy), applies `change` and
    /// stages the result.
    pub async fn modify(&self, key_values: &[Value], change: impl FnOnce(&mut E)) -> Result<E> {
        let key = self.key_from_values(key_values)?;
        let descriptor = E::descriptor();
        let mut entity = descriptor.from_document(&self.load_tracked(&key).await?)?;
        change(&mut entity);

        let document = descriptor.to_document(&entity);
        self.context
            .with_tracker::<E, _>(&self.definition, |tracker| {
                tracker.replace_current(&key, document)
            })?;
        Ok(entity)
    }
}

fn unexpected<E>(expected: &str, output: &QueryOutput<E>) -> Error {
    let found = match output {
        QueryOutput::Entities(_) => "entities",
        QueryOutput::Documents(_) => "projected rows",
        QueryOutput::Count(_) => "a count",
        QueryOutput::Flag(_) => "a flag",
        QueryOutput::Entity(_) => "an entity",
        QueryOutput::Document(_) => "a projected row",
    };
    QueryError::UnsupportedQueryShape(format!("expected {expected}, query returns {found}")).into()
}

fn passes_custom_filter(filter: Option<&FilterExpr>, document: &Document) -> Result<bool> {
    match filter {
        Some(filter) => Ok(filter.eval(document).map_err(QueryError::from)?),
        None => Ok(true),
    }
}

/// Sorts rows by the query's order field. Rows without the field go last in
/// either direction; values of different types order by type.
fn sort_rows(rows: &mut [(EntityKey, Document)], query: &CacheQuery) {
    let Some(field) = &query.order_by else {
        return;
    };
    let present = |document: &Document| document.get(field).filter(|v| !v.is_null()).cloned();
    rows.sort_by(|(_, a), (_, b)| match (present(a), present(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ordering = a
                .compare(&b)
                .unwrap_or_else(|| type_rank(&a).cmp(&type_rank(&b)));
            if query.order_desc {
                ordering.reverse()
            } else {
                ordering
            }
        }
    });
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Str(_) => 3,
        Value::Bytes(_) => 4,
        Value::List(_) => 5,
        Value::Map(_) => 6,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dynalinq_core::query::{field, FilterExpr};
    use dynalinq_core::ErrorKind;

    use super::*;
    use crate::cache::{KeyValueTableCacheFactory, MemoryCache};
    use crate::demo::{game_scores_table, seed_game_scores, GameScore, GAME_SCORES};
    use crate::storage::InMemoryStore;

    async fn context(store: &InMemoryStore) -> DataContext {
        let cache = Arc::new(MemoryCache::new(1_000));
        let ctx = DataContext::new(
            Arc::new(store.clone()),
            Arc::new(KeyValueTableCacheFactory::new(cache, 16)),
        );
        ctx.declare_table(game_scores_table(true), seed_game_scores)
            .await
            .unwrap();
        ctx
    }

    fn starship() -> QueryDescription {
        QueryDescription::new().filter(field("GameTitle").eq("Starship X"))
    }

    #[tokio::test]
    async fn test_explain_does_no_io() {
        let store = InMemoryStore::new();
        let ctx = context(&store).await;
        let table = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

        let before = store.operation_counts();
        let plan = table
            .explain(&starship().filter(field("TopScore").gt(30)))
            .unwrap();
        assert_eq!(plan.kind(), "index-query");
        assert_eq!(store.operation_counts().since(&before).total(), 0);
    }

    #[tokio::test]
    async fn test_ordered_query_and_reductions() {
        let store = InMemoryStore::new();
        let ctx = context(&store).await;
        let table = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

        let rows = table
            .to_vec(&starship().order_by_desc("TopScore"))
            .await
            .unwrap();
        let scores: Vec<i64> = rows.iter().map(|r| r.top_score).collect();
        assert_eq!(scores, vec![42, 24]);

        let lowest = table
            .execute(&starship().order_by_desc("TopScore").last())
            .await
            .unwrap();
        assert!(matches!(lowest, QueryOutput::Entity(e) if e.top_score == 24));

        assert_eq!(table.count(starship()).await.unwrap(), 2);
        assert!(table.any(starship()).await.unwrap());

        let all_high = table
            .execute(&starship().all(field("TopScore").gt(30)))
            .await
            .unwrap();
        assert_eq!(all_high, QueryOutput::Flag(false));
    }

    #[tokio::test]
    async fn test_single_reports_multiple_and_missing_rows() {
        let store = InMemoryStore::new();
        let ctx = context(&store).await;
        let table = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

        let err = table.single(starship()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MultipleResults);

        let err = table
            .single(QueryDescription::new().filter(field("GameTitle").eq("Nope")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_projection_returns_documents() {
        let store = InMemoryStore::new();
        let ctx = context(&store).await;
        let table = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

        let rows = table
            .select(&starship().select(["UserId"]).order_by("TopScore"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("UserId"), Some(&Value::from("102")));
        assert!(!rows[0].contains_key("TopScore"));
    }

    #[tokio::test]
    async fn test_unsupported_shape_fails_before_io() {
        let store = InMemoryStore::new();
        let ctx = context(&store).await;
        let table = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

        let before = store.operation_counts();
        let err = table
            .to_vec(&QueryDescription::new().filter(
                field("GameTitle")
                    .eq("Starship X")
                    .or(field("TopScore").gt(1)),
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedQueryShape);
        assert_eq!(store.operation_counts().since(&before).total(), 0);
    }

    #[tokio::test]
    async fn test_custom_filter_applies_to_point_get() {
        let store = InMemoryStore::new();
        let ctx = context(&store).await;
        let table = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();

        let description = QueryDescription::new()
            .filter(field("UserId").eq("101"))
            .filter(field("GameTitle").eq("Starship X"))
            .custom_filter(FilterExpr::gt(
                FilterExpr::attr("TopScore"),
                FilterExpr::literal(100),
            ));
        assert_eq!(table.explain(&description).unwrap().kind(), "point-get");
        assert!(table.to_vec(&description).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partition_handle_only_sees_its_rows() {
        let store = InMemoryStore::new();
        let ctx = context(&store).await;
        let table = ctx
            .table_in_partition::<GameScore>(GAME_SCORES, "101")
            .await
            .unwrap();

        let rows = table.to_vec(&QueryDescription::new()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.user_id == "101"));

        let err = table
            .find(&[Value::from("102"), Value::from("Starship X")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = table
            .insert_on_submit(&GameScore::new("103", "Starship X", 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::KeySchemaMismatch);
    }

    #[tokio::test]
    async fn test_modify_stages_an_update() {
        let store = InMemoryStore::new();
        let ctx = context(&store).await;
        let table = ctx.table::<GameScore>(GAME_SCORES).await.unwrap();
        let key = [Value::from("101"), Value::from("Starship X")];

        let changed = table.modify(&key, |score| score.wins += 1).await.unwrap();
        assert_eq!(changed.wins, 1);
        assert!(ctx.has_changes());

        ctx.submit_changes().await.unwrap();
        let stored = store
            .peek(GAME_SCORES, &EntityKey::with_range("101", "Starship X"))
            .await
            .unwrap();
        assert_eq!(stored.get("Wins"), Some(&Value::Int(1)));
        assert_eq!(stored.get("Version"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_sort_puts_missing_values_last() {
        let row = |user: &str, score: Option<i64>| {
            let mut document = Document::new();
            document.insert("UserId".to_string(), Value::from(user));
            if let Some(score) = score {
                document.insert("TopScore".to_string(), Value::Int(score));
            }
            (EntityKey::hash_only(user), document)
        };
        let mut rows = vec![row("a", None), row("b", Some(1)), row("c", Some(5))];

        let query = CacheQuery::new(ConditionSet::new()).ordered_by("TopScore", true);
        sort_rows(&mut rows, &query);

        let order: Vec<String> = rows.iter().map(|(k, _)| k.hash().to_string()).collect();
        assert_eq!(order, vec!["\"c\"", "\"b\"", "\"a\""]);
    }
}
