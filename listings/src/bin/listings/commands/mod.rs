pub mod collections;
pub mod indexes;
pub mod plan;
pub mod search;
pub mod seed;

use clap::Args;
use listings::SearchQuery;

/// Search parameters, named as the HTTP query string names them.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Free-text query
    #[arg(long)]
    pub q: Option<String>,

    /// Categories, comma or pipe separated
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub min_price: Option<String>,

    #[arg(long)]
    pub max_price: Option<String>,

    /// Rating floor (0-5)
    #[arg(long)]
    pub min_rating: Option<String>,

    /// Amenities, comma or pipe separated (any-of)
    #[arg(long)]
    pub amenities: Option<String>,

    /// Case-insensitive area substring
    #[arg(long)]
    pub area: Option<String>,

    /// Only featured listings
    #[arg(long)]
    pub featured: bool,

    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<String>,

    #[arg(long, allow_hyphen_values = true)]
    pub lng: Option<String>,

    /// Search radius in kilometers
    #[arg(long)]
    pub max_distance: Option<String>,

    /// Extra range filter `name:min,max` (repeatable; `*` leaves a bound open)
    #[arg(long = "range")]
    pub ranges: Vec<String>,

    #[arg(long)]
    pub page: Option<String>,

    #[arg(long)]
    pub page_size: Option<String>,

    #[arg(long)]
    pub sort_by: Option<String>,

    /// asc or desc
    #[arg(long)]
    pub sort_order: Option<String>,
}

impl QueryArgs {
    pub fn into_search_query(self) -> SearchQuery {
        SearchQuery {
            q: self.q,
            category: self.category,
            min_price: self.min_price,
            max_price: self.max_price,
            min_rating: self.min_rating,
            amenities: self.amenities,
            area: self.area,
            featured: self.featured.then(|| "true".to_string()),
            lat: self.lat,
            lng: self.lng,
            max_distance: self.max_distance,
            range: self.ranges,
            page: self.page,
            page_size: self.page_size,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn featured_flag_becomes_query_string_value() {
        let query = QueryArgs {
            featured: true,
            ranges: vec!["stars:3,*".to_string()],
            ..QueryArgs::default()
        }
        .into_search_query();
        assert_eq!(query.featured.as_deref(), Some("true"));
        assert_eq!(query.range, vec!["stars:3,*".to_string()]);
        assert!(query.q.is_none());
    }
}
