//! Reconcile orchestration
//!
//! One reconcile pass for one recommendation: fetch, decide, maybe run the
//! recommender, fold the outcome into status and persist it when it changed.
//! The controller holds no per-recommendation state between passes.

use crate::clock::{Clock, SystemClock};
use crate::events::{self, EventRecorder, EventType};
use crate::models::{ObjectKey, Recommendation};
use crate::observability::{ControllerMetrics, StructuredLogger};
use crate::recommender::RecommenderFactory;
use crate::scheduling::{decide, Decision, ERROR_FALLBACK_PERIOD};
use crate::status::{is_ready, reconcile_status, RecommendOutcome};
use crate::store::{RecommendationStore, StoreError};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// When the caller should invoke reconcile again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Rely on the caller's baseline cadence
    None,
    After(Duration),
}

/// How a reconcile pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilePhase {
    /// Marked for deletion, nothing done
    Deleted,
    Skipped,
    /// Periodic deadline passed; parked until the next invocation
    Resync,
    Ready,
    ConstructionFailed,
    OfferFailed,
}

impl ReconcilePhase {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ReconcilePhase::ConstructionFailed | ReconcilePhase::OfferFailed
        )
    }
}

/// What happened to the computed status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    /// Nothing to write
    Unchanged,
    Written { resource_version: u64 },
    /// The write was rejected; the next pass recomputes and retries
    Failed(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub requeue: Requeue,
    pub phase: ReconcilePhase,
    pub persistence: Persistence,
}

impl Reconciled {
    fn untouched(phase: ReconcilePhase, requeue: Requeue) -> Self {
        Self {
            requeue,
            phase,
            persistence: Persistence::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("recommendation {0} not found")]
    NotFound(ObjectKey),

    #[error("reconcile of {0} cancelled")]
    Cancelled(ObjectKey),

    #[error(transparent)]
    Store(StoreError),
}

/// Reconciles recommendations against their computed results
pub struct Controller {
    store: Arc<dyn RecommendationStore>,
    factory: Arc<dyn RecommenderFactory>,
    recorder: Arc<dyn EventRecorder>,
    clock: Arc<dyn Clock>,
    error_fallback_period: Duration,
    metrics: Option<ControllerMetrics>,
    logger: StructuredLogger,
}

impl Controller {
    /// Run one reconcile pass for `key`.
    ///
    /// Recommender failures are reported through [`Reconciled::phase`] with a
    /// fallback requeue; only a missing object, a failed fetch or cancellation
    /// surface as errors.
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Reconciled, ReconcileError> {
        let started = Instant::now();
        let result = self.reconcile_inner(key, cancel).await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_reconcile_latency(started.elapsed().as_secs_f64());
        }
        result
    }

    async fn reconcile_inner(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Reconciled, ReconcileError> {
        debug!(namespace = %key.namespace, name = %key.name, "Got Recommendation");

        let recommendation = until_cancelled(key, cancel, self.store.get(key))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound(key) => ReconcileError::NotFound(key),
                other => ReconcileError::Store(other),
            })?;

        if recommendation.is_deleting() {
            return Ok(Reconciled::untouched(ReconcilePhase::Deleted, Requeue::None));
        }

        let now = self.clock.now();
        let decision = decide(
            &recommendation.spec,
            &recommendation.status,
            recommendation.metadata.creation_timestamp,
            now,
        );
        if let Some(metrics) = &self.metrics {
            metrics.inc_decision(decision.as_str());
        }

        match decision {
            Decision::Skip => {
                debug!(
                    namespace = %key.namespace,
                    name = %key.name,
                    "Nothing happens for Recommendation"
                );
                Ok(Reconciled::untouched(ReconcilePhase::Skipped, Requeue::None))
            }
            Decision::ResyncAfter(delay) => {
                debug!(
                    namespace = %key.namespace,
                    name = %key.name,
                    retry_after_secs = delay.as_secs(),
                    "Retry recommendation later"
                );
                Ok(Reconciled::untouched(
                    ReconcilePhase::Resync,
                    Requeue::After(delay),
                ))
            }
            Decision::Run => self.recommend(key, recommendation, now, cancel).await,
        }
    }

    async fn recommend(
        &self,
        key: &ObjectKey,
        recommendation: Recommendation,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Reconciled, ReconcileError> {
        info!(
            namespace = %key.namespace,
            name = %key.name,
            "Starting to process Recommendation"
        );

        let constructed =
            until_cancelled(key, cancel, self.factory.new_recommender(&recommendation)).await?;
        let outcome = match constructed {
            Err(e) => RecommendOutcome::ConstructionFailed(e),
            Ok(recommender) => match until_cancelled(key, cancel, recommender.offer()).await? {
                Ok(proposed) => RecommendOutcome::Proposed(proposed),
                Err(e) => RecommendOutcome::OfferFailed(e),
            },
        };

        let (phase, requeue) = match &outcome {
            RecommendOutcome::Proposed(_) => {
                let algorithm = recommendation.spec.algorithm.algorithm_type;
                self.logger.log_recommendation_ready(key, algorithm.as_str());
                (ReconcilePhase::Ready, Requeue::None)
            }
            RecommendOutcome::ConstructionFailed(e) => {
                self.report_failure(
                    key,
                    "construction",
                    events::reasons::FAILED_CREATE_RECOMMENDER,
                    &e.to_string(),
                );
                (
                    ReconcilePhase::ConstructionFailed,
                    Requeue::After(self.error_fallback_period),
                )
            }
            RecommendOutcome::OfferFailed(e) => {
                self.report_failure(
                    key,
                    "offer",
                    events::reasons::FAILED_OFFER_RECOMMENDATION,
                    &e.to_string(),
                );
                (
                    ReconcilePhase::OfferFailed,
                    Requeue::After(self.error_fallback_period),
                )
            }
        };

        let update = reconcile_status(&recommendation.status, &outcome, now);
        if !update.changed {
            return Ok(Reconciled {
                requeue,
                phase,
                persistence: Persistence::Unchanged,
            });
        }

        let ready = is_ready(&update.status);
        let mut next = recommendation;
        next.status = update.status;

        // Nothing is written once cancellation has been requested.
        let persistence = match until_cancelled(key, cancel, self.store.update(next)).await? {
            Ok(stored) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_status_updates();
                }
                self.logger
                    .log_status_updated(key, stored.metadata.resource_version, ready);
                Persistence::Written {
                    resource_version: stored.metadata.resource_version,
                }
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_status_update_failures();
                }
                let message = e.to_string();
                self.recorder.emit(
                    key,
                    EventType::Warning,
                    events::reasons::FAILED_UPDATE_STATUS,
                    &message,
                );
                self.logger.log_status_update_failed(key, &message);
                Persistence::Failed(e)
            }
        };

        Ok(Reconciled {
            requeue,
            phase,
            persistence,
        })
    }

    fn report_failure(&self, key: &ObjectKey, stage: &str, reason: &str, error: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_recommender_failure(stage);
        }
        self.recorder.emit(key, EventType::Warning, reason, error);
        self.logger.log_recommendation_failed(key, stage, error);
    }
}

/// Await `fut` unless `cancel` fires first; a token that is already
/// cancelled wins before `fut` is polled.
async fn until_cancelled<F: Future>(
    key: &ObjectKey,
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ReconcileError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::Cancelled(key.clone())),
        output = fut => Ok(output),
    }
}

/// Builder for the reconcile controller
pub struct ControllerBuilder {
    store: Option<Arc<dyn RecommendationStore>>,
    factory: Option<Arc<dyn RecommenderFactory>>,
    recorder: Option<Arc<dyn EventRecorder>>,
    clock: Arc<dyn Clock>,
    error_fallback_period: Duration,
    metrics: Option<ControllerMetrics>,
    logger: StructuredLogger,
}

impl ControllerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            factory: None,
            recorder: None,
            clock: Arc::new(SystemClock),
            error_fallback_period: ERROR_FALLBACK_PERIOD,
            metrics: None,
            logger: StructuredLogger::new("recommendation"),
        }
    }

    pub fn store(mut self, store: Arc<dyn RecommendationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn factory(mut self, factory: Arc<dyn RecommenderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn EventRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Requeue delay after a recommender failure
    pub fn error_fallback_period(mut self, period: Duration) -> Self {
        self.error_fallback_period = period;
        self
    }

    pub fn metrics(mut self, metrics: ControllerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn build(self) -> Result<Controller> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Store is required"))?;
        let factory = self
            .factory
            .ok_or_else(|| anyhow::anyhow!("Recommender factory is required"))?;
        let recorder = self
            .recorder
            .ok_or_else(|| anyhow::anyhow!("Event recorder is required"))?;

        Ok(Controller {
            store,
            factory,
            recorder,
            clock: self.clock,
            error_fallback_period: self.error_fallback_period,
            metrics: self.metrics,
            logger: self.logger,
        })
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::condition::{self, reasons, ConditionStatus, CONDITION_READY};
    use crate::events::MemoryEventRecorder;
    use crate::models::{
        Algorithm, AlgorithmType, CompletionStrategy, ContainerRecommendation, ObjectMeta,
        RecommendationSpec, RecommendationStatus, RecommendationType, ResourceRequest, TargetRef,
    };
    use crate::recommender::{ProposedResult, RecommendError, Recommender};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use prometheus::Registry;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted factory: pops one behaviour per construction
    #[derive(Clone, Debug)]
    enum Script {
        Offer(u32),
        FailConstruction,
        FailOffer,
        /// Offer never completes
        Hang,
        /// Offer succeeds but cancels the token on the way out
        CancelDuringOffer(CancellationToken),
    }

    struct ScriptedFactory {
        script: Mutex<Vec<Script>>,
        fallback: Script,
        constructed: AtomicUsize,
    }

    impl ScriptedFactory {
        fn always(script: Script) -> Self {
            Self {
                script: Mutex::new(Vec::new()),
                fallback: script,
                constructed: AtomicUsize::new(0),
            }
        }

        fn sequence(mut steps: Vec<Script>, fallback: Script) -> Self {
            steps.reverse();
            Self {
                script: Mutex::new(steps),
                fallback,
                constructed: AtomicUsize::new(0),
            }
        }

        fn constructed(&self) -> usize {
            self.constructed.load(Ordering::SeqCst)
        }
    }

    struct ScriptedRecommender {
        result: Result<ProposedResult, RecommendError>,
    }

    #[async_trait]
    impl Recommender for ScriptedRecommender {
        async fn offer(&self) -> Result<ProposedResult, RecommendError> {
            self.result.clone()
        }
    }

    struct HangingRecommender;

    #[async_trait]
    impl Recommender for HangingRecommender {
        async fn offer(&self) -> Result<ProposedResult, RecommendError> {
            std::future::pending().await
        }
    }

    struct CancellingRecommender {
        cancel: CancellationToken,
        result: Result<ProposedResult, RecommendError>,
    }

    #[async_trait]
    impl Recommender for CancellingRecommender {
        async fn offer(&self) -> Result<ProposedResult, RecommendError> {
            self.cancel.cancel();
            self.result.clone()
        }
    }

    fn proposal(cpu: u32) -> ProposedResult {
        ProposedResult {
            resource_request: Some(ResourceRequest {
                containers: vec![ContainerRecommendation {
                    container_name: "app".to_string(),
                    cpu_millicores: cpu,
                    memory_bytes: 128 * 1024 * 1024,
                }],
            }),
            effective_hpa: None,
        }
    }

    #[async_trait]
    impl RecommenderFactory for ScriptedFactory {
        async fn new_recommender(
            &self,
            _recommendation: &Recommendation,
        ) -> Result<Box<dyn Recommender>, RecommendError> {
            self.constructed.fetch_add(1, Ordering::SeqCst);
            let step = self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| self.fallback.clone());
            match step {
                Script::FailConstruction => Err(RecommendError::UnsupportedAlgorithm(
                    AlgorithmType::LinearTrend,
                )),
                Script::FailOffer => Ok(Box::new(ScriptedRecommender {
                    result: Err(RecommendError::Provider("metrics backend down".to_string())),
                })),
                Script::Offer(cpu) => Ok(Box::new(ScriptedRecommender {
                    result: Ok(proposal(cpu)),
                })),
                Script::Hang => Ok(Box::new(HangingRecommender)),
                Script::CancelDuringOffer(cancel) => Ok(Box::new(CancellingRecommender {
                    cancel,
                    result: Ok(proposal(250)),
                })),
            }
        }
    }

    /// Store whose updates always conflict
    struct ConflictingStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl RecommendationStore for ConflictingStore {
        async fn get(&self, key: &ObjectKey) -> Result<Recommendation, StoreError> {
            self.inner.get(key).await
        }

        async fn update(&self, r: Recommendation) -> Result<Recommendation, StoreError> {
            Err(StoreError::Conflict {
                key: r.key(),
                expected: r.metadata.resource_version,
                found: r.metadata.resource_version + 1,
            })
        }

        async fn list(&self) -> Result<Vec<ObjectKey>, StoreError> {
            self.inner.list().await
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn recommendation(strategy: CompletionStrategy) -> Recommendation {
        Recommendation {
            metadata: ObjectMeta {
                namespace: "default".to_string(),
                name: "web-rec".to_string(),
                creation_timestamp: t0(),
                deletion_timestamp: None,
                resource_version: 0,
            },
            spec: RecommendationSpec {
                target_ref: TargetRef {
                    kind: "Deployment".to_string(),
                    name: "web".to_string(),
                },
                recommendation_type: RecommendationType::Resource,
                algorithm: Algorithm {
                    algorithm_type: AlgorithmType::Percentile,
                    params: BTreeMap::new(),
                },
                completion_strategy: strategy,
                timeout_seconds: Some(600),
            },
            status: RecommendationStatus::default(),
        }
    }

    struct Harness {
        controller: Controller,
        store: Arc<InMemoryStore>,
        factory: Arc<ScriptedFactory>,
        recorder: Arc<MemoryEventRecorder>,
        clock: Arc<ManualClock>,
        metrics: ControllerMetrics,
        key: ObjectKey,
    }

    fn harness(recommendation: Recommendation, factory: ScriptedFactory) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let key = store.insert(recommendation).key();
        let factory = Arc::new(factory);
        let recorder = Arc::new(MemoryEventRecorder::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let metrics = ControllerMetrics::new(&Registry::new()).unwrap();

        let controller = ControllerBuilder::new()
            .store(store.clone())
            .factory(factory.clone())
            .recorder(recorder.clone())
            .clock(clock.clone())
            .metrics(metrics.clone())
            .build()
            .unwrap();

        Harness {
            controller,
            store,
            factory,
            recorder,
            clock,
            metrics,
            key,
        }
    }

    fn at(h: &Harness, secs: i64) {
        h.clock.set(t0() + ChronoDuration::seconds(secs));
    }

    #[tokio::test]
    async fn test_builder_requires_store() {
        let result = ControllerBuilder::new()
            .factory(Arc::new(ScriptedFactory::always(Script::Offer(1))))
            .recorder(Arc::new(MemoryEventRecorder::new()))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_recommendation_is_not_found() {
        let h = harness(
            recommendation(CompletionStrategy::Once),
            ScriptedFactory::always(Script::Offer(100)),
        );
        let missing = ObjectKey::new("default", "gone");

        let err = h
            .controller
            .reconcile(&missing, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ReconcileError::NotFound(missing));
        assert_eq!(h.factory.constructed(), 0);
    }

    #[tokio::test]
    async fn test_deleting_recommendation_is_left_alone() {
        let mut rec = recommendation(CompletionStrategy::Once);
        rec.metadata.deletion_timestamp = Some(t0());
        let h = harness(rec, ScriptedFactory::always(Script::Offer(100)));

        let result = h
            .controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.phase, ReconcilePhase::Deleted);
        assert_eq!(result.requeue, Requeue::None);
        assert_eq!(h.factory.constructed(), 0);
    }

    #[tokio::test]
    async fn test_once_success_then_skip() {
        let h = harness(
            recommendation(CompletionStrategy::Once),
            ScriptedFactory::always(Script::Offer(250)),
        );
        at(&h, 10);

        let first = h
            .controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.phase, ReconcilePhase::Ready);
        assert_eq!(first.requeue, Requeue::None);
        assert_eq!(first.persistence, Persistence::Written { resource_version: 2 });

        let stored = h.store.get(&h.key).await.unwrap();
        assert_eq!(
            stored.status.last_successful_time,
            Some(t0() + ChronoDuration::seconds(10))
        );

        at(&h, 20);
        let second = h
            .controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.phase, ReconcilePhase::Skipped);
        assert_eq!(h.factory.constructed(), 1);
        assert_eq!(h.store.get(&h.key).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_construction_failure_records_condition_and_requeues() {
        let h = harness(
            recommendation(CompletionStrategy::Once),
            ScriptedFactory::always(Script::FailConstruction),
        );

        let result = h
            .controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.phase, ReconcilePhase::ConstructionFailed);
        assert_eq!(result.requeue, Requeue::After(ERROR_FALLBACK_PERIOD));
        assert!(matches!(result.persistence, Persistence::Written { .. }));

        let stored = h.store.get(&h.key).await.unwrap();
        let ready = condition::find(&stored.status.conditions, CONDITION_READY).unwrap();
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(ready.reason, reasons::FAILED_CREATE_RECOMMENDER);
        assert!(stored.status.last_successful_time.is_none());
        assert_eq!(
            h.recorder.reasons(),
            vec![events::reasons::FAILED_CREATE_RECOMMENDER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_offer_failure_keeps_previous_proposal() {
        let h = harness(
            recommendation(CompletionStrategy::Periodical { period_seconds: 300 }),
            ScriptedFactory::sequence(vec![Script::Offer(250)], Script::FailOffer),
        );

        h.controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();
        at(&h, 50);
        let result = h
            .controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.phase, ReconcilePhase::OfferFailed);
        assert_eq!(result.requeue, Requeue::After(ERROR_FALLBACK_PERIOD));

        let stored = h.store.get(&h.key).await.unwrap();
        let ready = condition::find(&stored.status.conditions, CONDITION_READY).unwrap();
        assert_eq!(ready.reason, reasons::FAILED_OFFER_RECOMMEND);
        assert!(ready.message.contains("metrics backend down"));
        assert_eq!(
            stored.status.resource_request.unwrap().containers[0].cpu_millicores,
            250
        );
        assert_eq!(stored.status.last_successful_time, Some(t0()));
        assert_eq!(h.metrics.status_updates(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_written() {
        let h = harness(
            recommendation(CompletionStrategy::Periodical { period_seconds: 300 }),
            ScriptedFactory::always(Script::Offer(250)),
        );

        let first = h
            .controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();
        let second = h
            .controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(first.persistence, Persistence::Written { .. }));
        assert_eq!(second.persistence, Persistence::Unchanged);
        assert_eq!(second.phase, ReconcilePhase::Ready);
        assert_eq!(h.metrics.status_updates(), 1);
        assert_eq!(h.metrics.decisions("run"), 2);
    }

    #[tokio::test]
    async fn test_periodical_past_deadline_resyncs_without_recommending() {
        let mut rec = recommendation(CompletionStrategy::Periodical { period_seconds: 300 });
        rec.status.last_successful_time = Some(t0());
        let h = harness(rec, ScriptedFactory::always(Script::Offer(250)));
        at(&h, 1000);

        let result = h
            .controller
            .reconcile(&h.key, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.phase, ReconcilePhase::Resync);
        assert_eq!(
            result.requeue,
            Requeue::After(crate::scheduling::RESYNC_PERIOD)
        );
        assert_eq!(h.factory.constructed(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_fetch() {
        let h = harness(
            recommendation(CompletionStrategy::Once),
            ScriptedFactory::always(Script::Offer(250)),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h.controller.reconcile(&h.key, &cancel).await.unwrap_err();
        assert_eq!(err, ReconcileError::Cancelled(h.key.clone()));
        assert_eq!(h.factory.constructed(), 0);
        assert_eq!(
            h.store.get(&h.key).await.unwrap().metadata.resource_version,
            1
        );
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_pending_offer() {
        let h = harness(
            recommendation(CompletionStrategy::Once),
            ScriptedFactory::always(Script::Hang),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            h.controller.reconcile(&h.key, &cancel),
        )
        .await
        .expect("reconcile should return once cancelled");

        assert_eq!(result.unwrap_err(), ReconcileError::Cancelled(h.key.clone()));
        assert_eq!(h.factory.constructed(), 1);
        assert!(h.recorder.events().is_empty());
        assert_eq!(
            h.store.get(&h.key).await.unwrap().metadata.resource_version,
            1
        );
    }

    #[tokio::test]
    async fn test_cancellation_after_offer_skips_status_write() {
        let cancel = CancellationToken::new();
        let h = harness(
            recommendation(CompletionStrategy::Once),
            ScriptedFactory::always(Script::CancelDuringOffer(cancel.clone())),
        );

        let err = h.controller.reconcile(&h.key, &cancel).await.unwrap_err();
        assert_eq!(err, ReconcileError::Cancelled(h.key.clone()));

        let stored = h.store.get(&h.key).await.unwrap();
        assert_eq!(stored.metadata.resource_version, 1);
        assert!(condition::find(&stored.status.conditions, CONDITION_READY).is_none());
        assert!(stored.status.last_successful_time.is_none());
        assert_eq!(h.metrics.status_updates(), 0);
    }

    #[tokio::test]
    async fn test_conflicting_write_is_reported() {
        let inner = InMemoryStore::new();
        let key = inner.insert(recommendation(CompletionStrategy::Once)).key();
        let recorder = Arc::new(MemoryEventRecorder::new());
        let controller = ControllerBuilder::new()
            .store(Arc::new(ConflictingStore { inner }))
            .factory(Arc::new(ScriptedFactory::always(Script::Offer(250))))
            .recorder(recorder.clone())
            .clock(Arc::new(ManualClock::new(t0())))
            .build()
            .unwrap();

        let result = controller
            .reconcile(&key, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.phase, ReconcilePhase::Ready);
        assert!(matches!(
            result.persistence,
            Persistence::Failed(StoreError::Conflict { .. })
        ));
        assert_eq!(
            recorder.reasons(),
            vec![events::reasons::FAILED_UPDATE_STATUS.to_string()]
        );
    }
}
