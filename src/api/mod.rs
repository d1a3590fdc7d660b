pub mod accrual;
pub mod leave_balance;
pub mod leave_request;
pub mod leave_type;
pub mod statistics;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::LeaveError;

/// Error body shared by every endpoint.
#[derive(Serialize, ToSchema)]
#[schema(example = json!({
    "error": "insufficient_balance",
    "message": "requested 3 days, available balance 1"
}))]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Calendar date the server evaluates policy against.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parses an enum query parameter, reporting the parameter name on failure.
pub(crate) fn parse_param<T: std::str::FromStr>(
    name: &str,
    value: Option<&str>,
) -> Result<Option<T>, LeaveError> {
    value
        .map(|v| {
            T::from_str(v.trim())
                .map_err(|_| LeaveError::validation(format!("{name} has invalid value '{v}'")))
        })
        .transpose()
}
