use axum::extract::{Extension, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::{CommissionAPI, MemberAPI};
use crate::auth::User;
use crate::entities::{AppCommission, CommissionKind, Member};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct CommissionParams {
    kind: CommissionKind,
    value: Decimal,
}

pub async fn register(
    Extension(api): Extension<DynAPI>,
    user: User,
) -> Result<Json<Member>, Error> {
    let member = api.register_member(user).await?;

    Ok(member.into())
}

pub async fn set_commission(
    Extension(api): Extension<DynAPI>,
    user: User,
    Json(params): Json<CommissionParams>,
) -> Result<Json<AppCommission>, Error> {
    let commission = api
        .set_app_commission(user, params.kind, params.value)
        .await?;

    Ok(commission.into())
}
