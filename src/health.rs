use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberState {
    Running,
    Stopped,
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthReport {
    pub status: Verdict,
    pub store: StoreState,
    pub subscriber: SubscriberState,
}

impl HealthReport {
    /// Only store reachability decides the verdict. A stopped subscriber is
    /// reported but the API can still serve everything already persisted.
    pub fn synthesize(store_reachable: bool, subscriber_running: bool) -> Self {
        Self {
            status: if store_reachable {
                Verdict::Healthy
            } else {
                Verdict::Unhealthy
            },
            store: if store_reachable {
                StoreState::Connected
            } else {
                StoreState::Disconnected
            },
            subscriber: if subscriber_running {
                SubscriberState::Running
            } else {
                SubscriberState::Stopped
            },
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == Verdict::Healthy
    }
}
