//! Location provider fed by the platform layer.
//!
//! The host pushes fixes as the positioning service reports them; a check-in
//! takes the latest one while it is fresh, otherwise it waits for the next
//! push. The visit service bounds the wait with its per-attempt timeout.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use fieldvisit_core::LocationProvider;
use fieldvisit_domain::{FieldVisitError, GpsFix, Result};
use tokio::sync::watch;
use tracing::debug;

pub struct PushedLocation {
    sender: watch::Sender<Option<GpsFix>>,
    max_age: Duration,
}

impl PushedLocation {
    pub fn new(max_age: Duration) -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender, max_age }
    }

    /// Record a fix reported by the positioning service.
    pub fn publish(&self, fix: GpsFix) {
        debug!(accuracy = fix.accuracy_meters, "location fix published");
        self.sender.send_replace(Some(fix));
    }

    fn is_fresh(&self, fix: &GpsFix) -> bool {
        Utc::now() - fix.captured_at <= self.max_age
    }
}

impl Default for PushedLocation {
    fn default() -> Self {
        Self::new(Duration::seconds(30))
    }
}

#[async_trait]
impl LocationProvider for PushedLocation {
    async fn current_fix(&self) -> Result<GpsFix> {
        let mut receiver = self.sender.subscribe();
        let fix = receiver
            .wait_for(|fix| fix.as_ref().is_some_and(|fix| self.is_fresh(fix)))
            .await
            .map_err(|_| FieldVisitError::GpsUnavailable { attempts: 1 })?;

        (*fix).ok_or(FieldVisitError::GpsUnavailable { attempts: 1 })
    }
}
