//! HTTP lookup server for the cpedict CPE dictionary.
//!
//! Serves vendor/product CPE lookups over the dictionary store:
//! - `GET /health`
//! - `GET /cpes/{vendor}/{product}`
//! - `GET /vendor-products`
//! - `GET /deprecated/{cpe_uri}`

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
