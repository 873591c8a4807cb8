use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers::listing;
use crate::state::AppState;

pub fn listing_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(listing::list_listings, listing::save_listing))
        .routes(routes!(listing::list_listings_by_sku))
        .routes(routes!(listing::get_listing))
        .routes(routes!(listing::enqueue_check))
        .routes(routes!(listing::mark_deleted))
}
