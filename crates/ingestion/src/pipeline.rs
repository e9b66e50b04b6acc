//! Ingestion Pipeline main entry

use std::collections::HashMap;
use std::sync::Arc;

use contracts::{ContractError, PointcloudInputConfig, PointcloudSource};
use tracing::{debug, info, instrument};

use crate::generic_adapter::SourceSubscription;
use crate::ingestor::PointcloudIngestor;
use crate::metrics::IngestionMetrics;
use crate::queue::{PointcloudQueue, QueueConsumer};

/// Ingestion Pipeline
///
/// Owns one ingestor (and queue) per configured input and any number of
/// transport subscriptions feeding each of them.
pub struct IngestionPipeline {
    /// Ingestors by topic
    inputs: HashMap<String, Arc<PointcloudIngestor>>,

    /// Registered subscriptions
    subscriptions: Vec<SourceSubscription>,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestionPipeline {
    pub fn new() -> Self {
        Self {
            inputs: HashMap::new(),
            subscriptions: Vec::new(),
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    /// Register an input and hand back the consumer side of its queue
    ///
    /// The config is validated here, once.
    #[instrument(
        name = "ingestion_register_input",
        skip(self, config),
        fields(topic = %config.topic_name, format = %config.topic_type)
    )]
    pub fn register_input(
        &mut self,
        config: PointcloudInputConfig,
    ) -> Result<QueueConsumer, ContractError> {
        let config = config.check_valid()?;
        if self.inputs.contains_key(&config.topic_name) {
            return Err(ContractError::config_validation(
                format!("inputs[{}].topic_name", config.topic_name),
                "duplicate topic",
            ));
        }

        let (producer, consumer) = PointcloudQueue::new(config.topic_queue_length);
        let ingestor = PointcloudIngestor::new(&config, producer, self.metrics.clone());
        debug!(topic = %config.topic_name, "registered pointcloud input");
        self.inputs.insert(config.topic_name, Arc::new(ingestor));
        Ok(consumer)
    }

    /// Attach a transport source to the input registered for its topic
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source),
        fields(topic = %source.topic())
    )]
    pub fn register_source(
        &mut self,
        source: Box<dyn PointcloudSource>,
    ) -> Result<(), ContractError> {
        let Some(ingestor) = self.inputs.get(source.topic()) else {
            return Err(ContractError::source_error(
                source.topic(),
                "no input registered for topic",
            ));
        };
        let ingestor = ingestor.clone();
        debug!(topic = %source.topic(), "registered pointcloud source");
        self.subscriptions
            .push(SourceSubscription::new(source, ingestor));
        Ok(())
    }

    /// Start all registered sources
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(count = self.subscriptions.len(), "starting all pointcloud sources");
        for subscription in &self.subscriptions {
            subscription.start();
        }
    }

    /// Stop all sources
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.subscriptions.len(), "stopping all pointcloud sources");
        for subscription in &self.subscriptions {
            subscription.stop();
        }
    }

    /// Ingestor for a registered topic
    pub fn ingestor(&self, topic: &str) -> Option<Arc<PointcloudIngestor>> {
        self.inputs.get(topic).cloned()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn source_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Check if any source of `topic` is listening
    pub fn is_topic_listening(&self, topic: &str) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.topic() == topic && s.is_listening())
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}
