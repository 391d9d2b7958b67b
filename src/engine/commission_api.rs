use super::Engine;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    api::CommissionAPI,
    auth::{Platform, User},
    entities::{AppCommission, CommissionKind},
    error::Error,
};

#[async_trait]
impl CommissionAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn set_app_commission(
        &self,
        user: User,
        kind: CommissionKind,
        value: Decimal,
    ) -> Result<AppCommission, Error> {
        self.authorize(user, "administer", Platform::default())?;

        let commission = AppCommission::new(kind, value)?;

        self.store.save_app_commission(&commission).await?;

        tracing::info!(?kind, %value, "app commission updated");

        Ok(commission)
    }
}
