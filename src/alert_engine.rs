// Trigger evaluation with hysteresis. Sustained-duration state is held in
// memory only; a restart starts the countdown over, which errs on the
// side of fewer false alerts.

use crate::alert_repo::AlertRepo;
use crate::models::{Device, Trigger};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

pub struct AlertEngine {
    repo: Arc<AlertRepo>,
    /// First violating sample per (device, trigger), cleared on recovery.
    violations: Mutex<HashMap<(i64, i64), DateTime<Utc>>>,
}

impl AlertEngine {
    pub fn new(repo: Arc<AlertRepo>) -> Self {
        Self {
            repo,
            violations: Mutex::new(HashMap::new()),
        }
    }

    /// Evaluates one sample against every enabled trigger that matches its
    /// metric and the device type. Returns the ids of alerts created.
    #[instrument(skip(self, device), fields(device_id = device.id, metric = metric_type))]
    pub async fn process_sample(
        &self,
        device: &Device,
        metric_type: &str,
        value: f64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<i64>> {
        let triggers = self.repo.list_enabled_triggers().await?;
        let mut created = Vec::new();
        for trigger in triggers {
            if !trigger.matches_metric(metric_type) || !trigger.applies_to(device.device_type) {
                continue;
            }
            if trigger.operator.evaluate(value, trigger.threshold) {
                if self.violation_sustained(device.id, &trigger, now).await {
                    if let Some(id) = self
                        .repo
                        .create_alert_if_absent(
                            device.id,
                            &trigger,
                            value,
                            device.display_name(),
                            now,
                        )
                        .await?
                    {
                        created.push(id);
                    }
                }
            } else {
                self.clear_violation(device.id, trigger.id).await;
                self.repo.resolve_open(device.id, &trigger.name, now).await?;
            }
        }
        Ok(created)
    }

    /// True when the violation has lasted at least the trigger's duration.
    /// Duration zero fires on the first violating sample.
    async fn violation_sustained(&self, device_id: i64, trigger: &Trigger, now: DateTime<Utc>) -> bool {
        if trigger.duration_seconds <= 0 {
            return true;
        }
        let mut violations = self.violations.lock().await;
        let first = *violations.entry((device_id, trigger.id)).or_insert(now);
        now.signed_duration_since(first) >= chrono::Duration::seconds(trigger.duration_seconds)
    }

    async fn clear_violation(&self, device_id: i64, trigger_id: i64) {
        self.violations.lock().await.remove(&(device_id, trigger_id));
    }
}
