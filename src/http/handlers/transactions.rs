use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::http::handlers::{ApiJson, ApiPath, ApiQuery};
use crate::http::{ApiResult, AppState};
use crate::ledger;
use crate::storage::{Asset, NewTransaction, Transaction};

/// Asset fields embedded in transaction listings.
#[derive(Debug, Serialize)]
pub struct AssetRef {
    pub symbol: String,
    pub name: String,
    pub icon: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionWithAsset {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub asset: Option<AssetRef>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

pub async fn list_transactions(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<TransactionWithAsset>>> {
    let transactions = state
        .storage
        .transactions_for_user(user_id, query.limit)
        .await?;
    let assets: HashMap<i32, Asset> = state
        .storage
        .list_assets()
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();

    let enriched = transactions
        .into_iter()
        .map(|transaction| {
            let asset = assets.get(&transaction.asset_id).map(|a| AssetRef {
                symbol: a.symbol.clone(),
                name: a.name.clone(),
                icon: a.icon.clone(),
            });
            TransactionWithAsset { transaction, asset }
        })
        .collect();
    Ok(Json(enriched))
}

pub async fn create_transaction(
    State(state): State<AppState>,
    ApiJson(tx): ApiJson<NewTransaction>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let recorded = ledger::record(state.storage.as_ref(), tx).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
