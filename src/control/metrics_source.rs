//! Instance metric sampling, abstracted away from any specific metrics backend.
//!
//! Real deployments plug in a CloudWatch-backed implementation; out of scope here
//! (see SPEC_FULL.md §1/§6). `NullMetricsSource` always reports 0.0, matching the
//! original Python `get_metric()`'s own fallback on any failure.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::InstanceId;

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Average of `metric` over the trailing `window_minutes` for `instance_id`.
    async fn average(&self, instance_id: &InstanceId, metric: &str, window_minutes: u32) -> Result<f64>;

    /// Sum of `metric` over the trailing `window_minutes` for `instance_id`.
    async fn sum(&self, instance_id: &InstanceId, metric: &str, window_minutes: u32) -> Result<f64>;
}

pub struct NullMetricsSource;

#[async_trait]
impl MetricsSource for NullMetricsSource {
    async fn average(&self, _instance_id: &InstanceId, _metric: &str, _window_minutes: u32) -> Result<f64> {
        Ok(0.0)
    }

    async fn sum(&self, _instance_id: &InstanceId, _metric: &str, _window_minutes: u32) -> Result<f64> {
        Ok(0.0)
    }
}
