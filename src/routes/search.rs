//! Address search route.

use axum::extract::Query;
use axum::response::Json;
use serde::Deserialize;

use crate::model::AddressCandidate;
use crate::services::address;

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/addresses/search?q=` — autocomplete candidates from the
/// catalog, at most 5, catalog order.
pub async fn search_addresses(Query(params): Query<SearchParams>) -> Json<Vec<AddressCandidate>> {
    Json(address::search(&params.q))
}
