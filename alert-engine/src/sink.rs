use alert_dampening::{ConditionEval, TriggerMode};
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// Receives fire decisions. Called once per satisfied dampening, after its
/// state has been reset.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn on_dampening_satisfied(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: TriggerMode,
        satisfying_evals: &[Vec<ConditionEval>],
    ) -> anyhow::Result<()>;
}

/// A fire decision as a value, for sinks that queue or forward them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SatisfiedAlert {
    pub tenant_id: String,
    pub trigger_id: String,
    pub mode: TriggerMode,
    pub satisfying_evals: Vec<Vec<ConditionEval>>,
}

/// Writes every decision to the log. Used when nothing downstream is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAlertSink;

#[async_trait]
impl AlertSink for LoggingAlertSink {
    async fn on_dampening_satisfied(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: TriggerMode,
        satisfying_evals: &[Vec<ConditionEval>],
    ) -> anyhow::Result<()> {
        tracing::info!(
            tenant = tenant_id,
            trigger = trigger_id,
            %mode,
            cycles = satisfying_evals.len(),
            "dampening satisfied"
        );
        Ok(())
    }
}

/// Forwards decisions over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: mpsc::Sender<SatisfiedAlert>,
}

impl ChannelAlertSink {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<SatisfiedAlert>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl AlertSink for ChannelAlertSink {
    async fn on_dampening_satisfied(
        &self,
        tenant_id: &str,
        trigger_id: &str,
        mode: TriggerMode,
        satisfying_evals: &[Vec<ConditionEval>],
    ) -> anyhow::Result<()> {
        let alert = SatisfiedAlert {
            tenant_id: tenant_id.to_string(),
            trigger_id: trigger_id.to_string(),
            mode,
            satisfying_evals: satisfying_evals.to_vec(),
        };
        self.tx
            .send(alert)
            .await
            .map_err(|_| anyhow::anyhow!("alert channel closed"))
    }
}
