use axum::Json;
use axum::extract::{Path, Query, State};
use tracing::{info, instrument};

use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::models::listing::*;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/listings",
    tag = "Listings",
    operation_id = "listListings",
    summary = "List listings",
    description = "Returns one page of listings ordered by `orderBy` then id. No total count is computed. Comments are omitted.",
    params(ListingListQuery),
    responses(
        (status = 200, description = "One page of listings", body = ListingPage),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingListQuery>,
) -> Result<Json<ListingPage>, AppError> {
    let query = query.into_query(None)?;
    let items = state.store.list(&query).await?;
    Ok(Json(ListingPage::new(items, &query)))
}

#[utoipa::path(
    get,
    path = "/listings/sku/{sku}",
    tag = "Listings",
    operation_id = "listListingsBySku",
    summary = "List listings of one SKU",
    description = "Same as `listListings`, restricted to one SKU.",
    params(
        ("sku" = String, Path, description = "SKU", example = "5021;6"),
        ListingListQuery,
    ),
    responses(
        (status = 200, description = "One page of listings", body = ListingPage),
        (status = 400, description = "Invalid query (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_listings_by_sku(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Query(query): Query<ListingListQuery>,
) -> Result<Json<ListingPage>, AppError> {
    let query = query.into_query(Some(sku))?;
    let items = state.store.list(&query).await?;
    Ok(Json(ListingPage::new(items, &query)))
}

#[utoipa::path(
    get,
    path = "/listings/id/{id}",
    tag = "Listings",
    operation_id = "getListing",
    summary = "Get a listing by id",
    params(("id" = String, Path, description = "Listing id", example = "440_1234567890")),
    responses(
        (status = 200, description = "The listing", body = ListingResponse),
        (status = 404, description = "Listing does not exist (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state))]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListingResponse>, AppError> {
    let listing = state
        .store
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Listing does not exist".into()))?;
    Ok(Json(listing.into()))
}

#[utoipa::path(
    post,
    path = "/listings/id/{id}/check",
    tag = "Listings",
    operation_id = "enqueueListingCheck",
    summary = "Queue a recheck of a listing",
    description = "At most one job exists per listing. An existing job may be kept, promoted or replaced depending on its state, priority and delay.",
    params(
        ("id" = String, Path, description = "Listing id", example = "440_1234567890"),
        CheckListingQuery,
    ),
    responses(
        (status = 200, description = "Whether a new job was created", body = EnqueueResponse),
        (status = 400, description = "Invalid id (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn enqueue_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CheckListingQuery>,
) -> Result<Json<EnqueueResponse>, AppError> {
    if !is_valid_listing_id(&id) {
        return Err(AppError::Validation("Invalid id".into()));
    }
    let request = query.into_request()?;
    let enqueued = state.scheduler.enqueue(&id, request).await?;
    Ok(Json(EnqueueResponse { enqueued }))
}

#[utoipa::path(
    post,
    path = "/listings",
    tag = "Listings",
    operation_id = "saveListing",
    summary = "Save a feed listing",
    description = "Runs the listing through the same path as a `listing-update` event observed at `time`.",
    request_body = SaveListingRequest,
    responses(
        (status = 200, description = "Whether the store changed", body = SaveListingResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(listing_id = %payload.listing.id))]
pub async fn save_listing(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SaveListingRequest>,
) -> Result<Json<SaveListingResponse>, AppError> {
    let written = state
        .ingestor
        .save_listing(&payload.listing, false, payload.time)
        .await?;

    Ok(Json(SaveListingResponse {
        saved: written.is_some(),
        listing: written.map(ListingResponse::from),
    }))
}

#[utoipa::path(
    post,
    path = "/listings/id/{id}/deleted",
    tag = "Listings",
    operation_id = "markListingDeleted",
    summary = "Flag a listing as deleted",
    description = "Sets `isDeleted` without touching `lastSeenAt`. Succeeds whether or not the listing exists.",
    params(("id" = String, Path, description = "Listing id", example = "440_1234567890")),
    responses(
        (status = 200, description = "The id", body = DeletedResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn mark_deleted(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let existed = state.store.mark_deleted(&id).await?;
    info!(existed, "Listing flagged as deleted");
    Ok(Json(DeletedResponse { id }))
}
