//! Orchestrator: one stateless entry point per request.
//!
//! ```text
//! extract ─▶ check conflicts ─┬─ conflicts ─▶ prompts (needs_clarification)
//!                             └─ none ──────▶ map ─▶ generate ─▶ SQL
//!
//! resume(original, responses) ─▶ apply ─▶ check ─┬─ resolved ─▶ map ─▶ generate
//!                                                ├─ rounds left ─▶ prompts
//!                                                └─ budget spent ─▶ failed
//! ```
//!
//! Nothing is kept between calls: the caller holds on to the returned
//! entities and sends them back with the user's answers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::clarification::{
    ClarificationEvent, ClarificationPrompt, ClarificationRequest, ClarificationService,
    ClarificationState,
};
use crate::config::{Settings, TranslationSettings};
use crate::error::{NlqError, Result};
use crate::extraction::{EntityExtractor, KeywordRecognizer, RawEntityRecognizer};
use crate::generation::{
    ComparisonQuery, PartitionAccess, RowLevelSecurity, SqlGenerator, SqlTranslationResult,
    TranslationContext,
};
use crate::knowledge::{Catalog, KnowledgeBase};
use crate::mapping::{MappingError, QueryMapper};
use crate::model::{Comparison, EntityConflict, ExplicitRange, QueryEntities, TimeRange};

/// Everything the caller needs after one request.
#[derive(Debug, Clone, Serialize)]
pub struct NlpQueryResult {
    pub query_id: Uuid,
    /// Send these back with the answers when `needs_clarification` is set.
    pub entities: QueryEntities,
    pub conflicts: Vec<EntityConflict>,
    pub prompts: Vec<ClarificationPrompt>,
    pub result: Option<SqlTranslationResult>,
    pub needs_clarification: bool,
    pub state: ClarificationState,
    /// User-facing reason when no SQL could be produced.
    pub error: Option<String>,
}

impl NlpQueryResult {
    fn new(entities: QueryEntities, state: ClarificationState) -> Self {
        Self {
            query_id: Uuid::new_v4(),
            entities,
            conflicts: Vec::new(),
            prompts: Vec::new(),
            result: None,
            needs_clarification: false,
            state,
            error: None,
        }
    }

    fn failed(entities: QueryEntities, state: ClarificationState, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(entities, state)
        }
    }

    /// Generated SQL, if translation succeeded.
    pub fn sql(&self) -> Option<&str> {
        self.result
            .as_ref()
            .filter(|r| r.success)
            .map(|r| r.sql.as_str())
    }
}

pub struct NlqService {
    knowledge: Arc<KnowledgeBase>,
    extractor: EntityExtractor,
    clarification: ClarificationService,
    mapper: QueryMapper,
    generator: SqlGenerator,
    settings: TranslationSettings,
}

impl NlqService {
    /// Build a service around a recognizer, scoping users with
    /// [`PartitionAccess`] unless replaced via [`NlqService::with_security`].
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        recognizer: Arc<dyn RawEntityRecognizer>,
        settings: TranslationSettings,
    ) -> Self {
        Self {
            extractor: EntityExtractor::new(knowledge.clone(), recognizer, settings.clone()),
            clarification: ClarificationService::new(
                knowledge.clone(),
                settings.max_clarification_rounds,
            ),
            mapper: QueryMapper::new(knowledge.clone(), settings.default_row_limit),
            generator: SqlGenerator::new(knowledge.clone(), settings.dialect)
                .with_security(Arc::new(PartitionAccess::default())),
            knowledge,
            settings,
        }
    }

    /// Catalog from settings (or the built-in one) and the keyword recognizer.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let catalog = match settings.knowledge.resolved_catalog_path()? {
            Some(path) => Catalog::from_file(path)?,
            None => Catalog::gaming()?,
        };
        let knowledge = Arc::new(KnowledgeBase::new(catalog));
        let recognizer = Arc::new(KeywordRecognizer::from_catalog(knowledge.catalog()));
        Ok(Self::new(knowledge, recognizer, settings.translation.clone()))
    }

    pub fn with_security(mut self, provider: Arc<dyn RowLevelSecurity>) -> Self {
        self.generator = SqlGenerator::new(self.knowledge.clone(), self.settings.dialect)
            .with_security(provider);
        self
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub fn extractor(&self) -> &EntityExtractor {
        &self.extractor
    }

    /// Translate a question. Extraction failures come back as a failed
    /// result; only a broken stage contract is an `Err`.
    #[instrument(skip(self, user_id), fields(scoped = user_id.is_some()))]
    pub async fn process_query(
        &self,
        query: &str,
        user_id: Option<&str>,
    ) -> Result<NlpQueryResult> {
        let state = ClarificationState::Extracted;
        let entities = match self.extractor.extract_entities(query).await {
            Ok(entities) => entities,
            Err(e) => {
                let error = NlqError::from(e).to_string();
                return Ok(NlpQueryResult::failed(
                    QueryEntities::new(query),
                    ClarificationState::Failed,
                    error,
                ));
            }
        };

        let conflicts = self.extractor.check_for_entity_conflicts(&entities);
        let state = state.transition(ClarificationEvent::Checked {
            conflicts: conflicts.len(),
        })?;
        debug!(%state, conflicts = conflicts.len(), "conflicts checked");

        if conflicts.is_empty() {
            self.translate(entities, state, user_id)
        } else {
            let request = self.clarification.request_clarification(&entities, conflicts);
            let state = state.transition(ClarificationEvent::PromptsIssued)?;
            Ok(Self::clarification_needed(entities, state, request))
        }
    }

    /// Apply the user's answers to the entities from an earlier result and
    /// continue from mapping. Unanswered conflicts are asked again while
    /// rounds remain. An invalid answer is reported in `error` and its
    /// prompt is asked again, or the query fails once the budget is spent.
    #[instrument(
        skip(self, original, responses, user_id),
        fields(rounds = original.clarification_rounds, answers = responses.len())
    )]
    pub async fn resume_with_clarification(
        &self,
        original: &QueryEntities,
        responses: &HashMap<String, String>,
        user_id: Option<&str>,
    ) -> Result<NlpQueryResult> {
        // A rejected answer still spends the round; the prompts are asked again.
        let (mut entities, rejected) = match self
            .clarification
            .apply_clarification_responses(original, responses)
        {
            Ok(entities) => (entities, None),
            Err(e) => {
                warn!(error = %e, "clarification answer rejected");
                (original.clone(), Some(e.to_string()))
            }
        };
        entities.clarification_rounds = original.clarification_rounds + 1;

        let conflicts = self.extractor.check_for_entity_conflicts(&entities);
        let state = ClarificationState::AwaitingClarification.transition(
            ClarificationEvent::Answered {
                remaining_conflicts: conflicts.len(),
                rounds: entities.clarification_rounds,
                max_rounds: self.clarification.max_rounds(),
            },
        )?;
        debug!(%state, remaining = conflicts.len(), "clarification applied");

        match state {
            ClarificationState::Resolved => self.translate(entities, state, user_id),
            ClarificationState::Failed => {
                let error = match rejected {
                    Some(reason) => format!(
                        "{}; no clarification rounds remain after {}",
                        reason, entities.clarification_rounds
                    ),
                    None => format!(
                        "Question is still ambiguous after {} clarification round(s)",
                        entities.clarification_rounds
                    ),
                };
                warn!(%error, "clarification budget spent");
                let mut result = NlpQueryResult::failed(entities, state, error);
                result.conflicts = conflicts;
                Ok(result)
            }
            _ => {
                let request = self.clarification.request_clarification(&entities, conflicts);
                Ok(NlpQueryResult {
                    error: rejected,
                    ..Self::clarification_needed(entities, state, request)
                })
            }
        }
    }

    /// Conflicts and prompts for entities the caller already holds.
    pub fn request_clarification(&self, entities: &QueryEntities) -> ClarificationRequest {
        let conflicts = self.extractor.check_for_entity_conflicts(entities);
        self.clarification.request_clarification(entities, conflicts)
    }

    pub fn apply_clarification_responses(
        &self,
        original: &QueryEntities,
        responses: &HashMap<String, String>,
    ) -> Result<QueryEntities> {
        Ok(self
            .clarification
            .apply_clarification_responses(original, responses)?)
    }

    /// SQL text for entities that are already fully resolved.
    pub fn generate_sql_from_entities(
        &self,
        entities: &QueryEntities,
        user_id: Option<&str>,
    ) -> Result<String> {
        let mapped = self.mapper.map(entities)?;
        let mut ctx = self.context(user_id);
        let result = self.generator.generate(&mapped, &mut ctx);
        if result.success {
            Ok(result.sql)
        } else {
            Err(NlqError::Generation(
                result.error_message.unwrap_or_default(),
            ))
        }
    }

    fn clarification_needed(
        entities: QueryEntities,
        state: ClarificationState,
        request: ClarificationRequest,
    ) -> NlpQueryResult {
        info!(prompts = request.prompts.len(), "clarification needed");
        NlpQueryResult {
            conflicts: request.conflicts,
            prompts: request.prompts,
            needs_clarification: true,
            ..NlpQueryResult::new(entities, state)
        }
    }

    fn context(&self, user_id: Option<&str>) -> TranslationContext {
        let ctx = TranslationContext::from_settings(&self.settings);
        match user_id {
            Some(user) => ctx.with_user(user),
            None => ctx,
        }
    }

    /// Map and generate conflict-free entities, plus one independent query
    /// per comparison directive.
    fn translate(
        &self,
        entities: QueryEntities,
        state: ClarificationState,
        user_id: Option<&str>,
    ) -> Result<NlpQueryResult> {
        let mapped = match self.mapper.map(&entities) {
            Ok(mapped) => mapped,
            Err(e @ MappingError::UnresolvedAmbiguity(_)) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "mapping failed");
                return Ok(NlpQueryResult::failed(entities, state, e.to_string()));
            }
        };

        let mut ctx = self.context(user_id);
        let mut result = self.generator.generate(&mapped, &mut ctx);

        if result.success && !entities.comparisons.is_empty() {
            match &mapped.time {
                None => result
                    .explanation
                    .push_str(" Comparisons skipped: the question has no time range."),
                Some(time) => {
                    for comparison in &entities.comparisons {
                        match self.comparison(&entities, *comparison, &time.range, user_id) {
                            Ok(query) => {
                                result
                                    .comparison_queries
                                    .insert(comparison.label().to_string(), query);
                            }
                            Err(reason) => {
                                warn!(comparison = comparison.label(), %reason, "comparison skipped");
                                result.explanation.push_str(&format!(
                                    " Comparison {} skipped: {}.",
                                    comparison.label(),
                                    reason
                                ));
                            }
                        }
                    }
                }
            }
        }

        let error = (!result.success).then(|| result.error_message.clone().unwrap_or_default());
        Ok(NlpQueryResult {
            result: Some(result),
            error,
            ..NlpQueryResult::new(entities, state)
        })
    }

    /// Re-run mapping and generation over the shifted period. The primary
    /// query is not touched.
    fn comparison(
        &self,
        entities: &QueryEntities,
        comparison: Comparison,
        range: &ExplicitRange,
        user_id: Option<&str>,
    ) -> std::result::Result<ComparisonQuery, String> {
        let shifted = match comparison {
            Comparison::PreviousPeriod => range.previous_period(),
            Comparison::YearOverYear => range.shift_months(12),
            Comparison::MonthOverMonth => range.shift_months(1),
        }
        .map_err(|e| e.to_string())?;

        let mut shifted_entities = entities.clone();
        shifted_entities.time_range = Some(TimeRange::Explicit(shifted.clone()));
        shifted_entities.comparisons.clear();

        let mapped = self.mapper.map(&shifted_entities).map_err(|e| e.to_string())?;
        let mut ctx = self.context(user_id);
        let result = self.generator.generate(&mapped, &mut ctx);
        if !result.success {
            return Err(result.error_message.unwrap_or_default());
        }
        Ok(ComparisonQuery {
            sql: result.sql,
            parameters: result.parameters,
            time_range: shifted,
        })
    }
}
