use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color as TableColor, Table};
use listings::{Client, CollectionProfile, DocumentStore, PageResult, SearchQuery, seed::DEFAULT_FIXTURE_COUNT};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::commands::QueryArgs;
use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, cell_text, json_path, themed_table};
use crate::theme::{PALETTE, Rgb, listing_badges};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Search MongoDB",
        commands: &[
            "listings search hotels --q \"lake view\"                  # Relevance-ranked text search",
            "listings search restaurants --category bengali,chinese --min-rating 4",
            "listings search hotels --range stars:4,* --sort-by price --page 2",
        ],
    },
    ExampleGroup {
        title: "Offline",
        commands: &["listings search hotels --memory --lat 22.5726 --lng 88.3639 --max-distance 3"],
    },
];

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Collection profile to search
    pub collection: String,

    #[command(flatten)]
    pub query: QueryArgs,

    /// Search generated fixtures in memory instead of MongoDB
    #[arg(long)]
    pub memory: bool,

    /// Fixture documents per collection when using --memory
    #[arg(long, default_value_t = DEFAULT_FIXTURE_COUNT, requires = "memory")]
    pub fixtures: usize,
}

#[derive(Serialize)]
struct SearchReport {
    #[serde(flatten)]
    page: PageResult<JsonValue>,
    #[serde(skip)]
    profile: CollectionProfile,
}

impl SearchReport {
    fn price_path(&self) -> Option<&str> {
        self.profile.range_field("price").map(|r| r.path.as_str())
    }
}

impl TableDisplay for SearchReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let has_distance = self.page.items.iter().any(|i| i.get("distance").is_some());
        let mut headers = vec!["#", "", "Name", "Category", "Area", "Rating", "Price", "Score"];
        if has_distance {
            headers.push("Distance (km)");
        }
        let mut table = themed_table(options, &headers);

        for (i, item) in self.page.items.iter().enumerate() {
            let mut row = vec![
                Cell::new(row_number(self.page.page, self.page.page_size, i)),
                badge_cell(
                    flag(item, &self.profile.featured_field),
                    flag(item, &self.profile.promoted_field),
                    options,
                ),
                Cell::new(cell_text(item.get("name"))),
                Cell::new(cell_text(json_path(item, &self.profile.category_field))),
                Cell::new(cell_text(json_path(item, &self.profile.area_field))),
                Cell::new(cell_text(json_path(item, &self.profile.rating_field))),
                Cell::new(cell_text(self.price_path().and_then(|p| json_path(item, p)))),
                Cell::new(cell_text(item.get("score"))),
            ];
            if has_distance {
                let km = item.get("distance").and_then(JsonValue::as_f64).map(|m| m / 1000.0);
                row.push(Cell::new(km.map_or_else(|| "-".to_string(), |km| format!("{km:.2}"))));
            }
            table.add_row(row);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "page={} size={} items={} total={} next={} prev={}",
            self.page.page,
            self.page.page_size,
            self.page.items.len(),
            self.page.total_count,
            self.page.has_next,
            self.page.has_prev
        )
    }
}

async fn run<S: DocumentStore>(
    client: &Client<S>,
    collection: &str,
    query: SearchQuery,
) -> Result<(CollectionProfile, PageResult<JsonValue>)> {
    let handle = client.collection(collection)?;
    let page = handle.search(query).await.context("Search failed")?;
    Ok((handle.profile().clone(), page))
}

pub async fn handle_search(args: SearchArgs, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let query = args.query.into_search_query();
    let (profile, page) = if args.memory {
        output.info(&format!("Searching {} in-memory fixtures per collection", args.fixtures));
        let client = ctx.memory_client(args.fixtures).await?;
        run(&client, &args.collection, query).await?
    } else {
        let client = ctx.mongo_client().await?;
        run(&client, &args.collection, query).await?
    };

    output.heading(&format!(
        "{} results in `{}` (page {} of {})",
        page.total_count,
        profile.collection,
        page.page,
        page.total_pages().max(1)
    ));
    if page.items.is_empty() {
        output.warning("No listings matched the filters");
    }
    output.display(&SearchReport { page, profile })
}

/// Badges are tinted through the table so column widths stay correct.
fn badge_cell(featured: bool, promoted: bool, options: &GlobalOptions) -> Cell {
    let cell = Cell::new(listing_badges(featured, promoted, false));
    if options.no_color || !(featured || promoted) {
        return cell;
    }
    let Rgb(r, g, b) = if featured { PALETTE.featured } else { PALETTE.promoted };
    cell.fg(TableColor::Rgb { r, g, b })
}

fn flag(item: &JsonValue, path: &str) -> bool {
    json_path(item, path).and_then(JsonValue::as_bool).unwrap_or(false)
}

/// One-based position of `index` within the whole result set.
fn row_number(page: u64, page_size: u64, index: usize) -> u64 {
    page.saturating_sub(1)
        .saturating_mul(page_size)
        .saturating_add(index as u64)
        .saturating_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_numbers_continue_across_pages() {
        assert_eq!(row_number(1, 25, 0), 1);
        assert_eq!(row_number(3, 10, 4), 25);
    }

    #[test]
    fn flags_read_nested_booleans_only() {
        let item = serde_json::json!({ "isFeatured": true, "promo": { "on": "yes" } });
        assert!(flag(&item, "isFeatured"));
        assert!(!flag(&item, "promo.on"));
        assert!(!flag(&item, "isPromoted"));
    }

    #[test]
    fn row_numbers_saturate_on_huge_pages() {
        assert_eq!(row_number(u64::MAX, 100, 7), u64::MAX);
        assert_eq!(row_number(0, 10, 0), 1);
    }
}
