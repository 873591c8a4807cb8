use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Outstanding "re-verify this listing" job. The id is the listing id.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recheck_job")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Lower runs first; NULL runs before any explicit priority.
    pub priority: Option<i32>,

    /// Delay requested at scheduling time, in milliseconds.
    pub delay_ms: Option<i64>,

    /// One of: waiting, delayed, active, completed, failed
    #[sea_orm(indexed)]
    pub state: String,

    pub attempts_made: i32,
    pub max_attempts: i32,
    /// Retry delay policy, e.g. `{"type": "exponential", "delay_ms": 5000}`.
    #[sea_orm(column_type = "JsonBinary")]
    pub backoff: Json,
    pub remove_on_complete: bool,
    pub remove_on_fail: bool,

    /// Earliest time the job may be claimed.
    pub run_at: DateTimeUtc,

    pub created_at: DateTimeUtc,

    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
}

impl ActiveModelBehavior for ActiveModel {}
