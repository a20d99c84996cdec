use serde::{Deserialize, Serialize};
use tracing::debug;

/// Raw landing-page filter parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilterParams {
    pub area: Option<String>,
    pub location: Option<String>,
    pub guests: Option<String>,
    pub function_type: Option<String>,
}

/// Conjunctive filter over venue listings. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingQuery {
    /// Case-insensitive exact match on the listing location.
    pub area: Option<String>,
    /// Case-insensitive substring match on the listing location.
    pub location_contains: Option<String>,
    /// Minimum guest capacity.
    pub min_capacity: Option<i64>,
    /// Case-insensitive match against one tag of the comma-separated services.
    pub service: Option<String>,
    /// Guest value that could not be parsed and was therefore not applied.
    pub ignored_guests: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ListingQuery {
    pub fn from_params(params: &ListingFilterParams) -> Self {
        let mut query = ListingQuery {
            area: non_blank(params.area.as_deref()),
            location_contains: non_blank(params.location.as_deref()),
            service: non_blank(params.function_type.as_deref()),
            ..Default::default()
        };

        if let Some(guests) = non_blank(params.guests.as_deref()) {
            match guests.parse::<i64>() {
                Ok(n) => query.min_capacity = Some(n),
                Err(_) => {
                    // Fails open: a malformed guest count never rejects the request.
                    debug!("Ignoring non-numeric guests filter: {}", guests);
                    query.ignored_guests = Some(guests);
                }
            }
        }

        query
    }

    /// True when no predicate will be applied.
    pub fn is_unfiltered(&self) -> bool {
        self.area.is_none()
            && self.location_contains.is_none()
            && self.min_capacity.is_none()
            && self.service.is_none()
    }
}
