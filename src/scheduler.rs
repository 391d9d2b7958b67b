use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::RideLimitLedger;
use crate::error::Error;
use crate::events::{DomainEvent, EventBus};

/// Every day at local midnight.
const DAILY_AT_MIDNIGHT: &str = "0 0 0 * * *";

pub fn daily_schedule() -> Result<Schedule, Error> {
    Schedule::from_str(DAILY_AT_MIDNIGHT)
        .map_err(|err| Error::Config(format!("reset schedule: {}", err)))
}

/// First firing of `schedule` strictly after `now`, read as wall-clock time
/// in `timezone`.
pub fn next_reset_at(
    schedule: &Schedule,
    now: DateTime<Utc>,
    timezone: Tz,
) -> Option<DateTime<Utc>> {
    schedule
        .after(&now.with_timezone(&timezone))
        .next()
        .map(|at| at.with_timezone(&Utc))
}

/// Clears every rider's usage at each local midnight.
pub struct DailyReset {
    ledger: RideLimitLedger,
    events: EventBus,
    schedule: Schedule,
    cancel_token: CancellationToken,
}

impl DailyReset {
    pub fn new(ledger: RideLimitLedger, events: EventBus) -> Result<Self, Error> {
        Ok(Self {
            ledger,
            events,
            schedule: daily_schedule()?,
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn start(&self) -> JoinHandle<()> {
        let ledger = self.ledger.clone();
        let events = self.events.clone();
        let schedule = self.schedule.clone();
        let token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = match next_reset_at(&schedule, now, ledger.timezone()) {
                    Some(next) => next,
                    None => {
                        tracing::error!("reset schedule has no further firings");
                        break;
                    }
                };
                let wait = (next - now).to_std().unwrap_or_default();

                tracing::debug!(next_reset_at = %next, "daily reset scheduled");

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {
                        match ledger.reset_if_active().await {
                            Ok(Some(_)) => events.publish(DomainEvent::RideLimitsReset),
                            Ok(None) => (),
                            Err(err) => tracing::error!(%err, "scheduled ride limit reset failed"),
                        }
                    }
                }
            }

            tracing::info!("daily reset stopped");
        })
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}
