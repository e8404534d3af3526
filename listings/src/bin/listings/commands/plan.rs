use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Table};
use listings::registry::ProfileRegistry;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::commands::QueryArgs;
use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, themed_table};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect Pipelines",
    commands: &[
        "listings plan hotels --q rooftop                      # Text search, ranked by relevance",
        "listings plan hotels --lat 22.57 --lng 88.36 --max-distance 5",
        "listings plan restaurants --category bengali --sort-by rating --output json",
    ],
}];

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Collection profile to plan against
    pub collection: String,

    #[command(flatten)]
    pub query: QueryArgs,
}

#[derive(Serialize)]
struct PlanReport {
    collection: String,
    pipeline: JsonValue,
}

impl TableDisplay for PlanReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["#", "Stage", "Body"]);
        let stages = self.pipeline.as_array().map(Vec::as_slice).unwrap_or_default();
        for (i, stage) in stages.iter().enumerate() {
            let Some((operator, body)) = stage.as_object().and_then(|o| o.iter().next()) else {
                continue;
            };
            let body = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
            table.add_row(vec![Cell::new(i + 1), Cell::new(operator), Cell::new(body)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.pipeline.to_string()
    }
}

/// Plans without touching any database.
pub async fn handle_plan(args: PlanArgs, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let registry = ProfileRegistry::from_config(&ctx.config)?;
    let profile = registry.resolve(&args.collection)?;
    let request = args
        .query
        .into_search_query()
        .into_request(&ctx.config)
        .context("Invalid search parameters")?;
    let pipeline = listings::ListingQueryPlanner::new(&ctx.config, profile)
        .plan(&request)
        .context("Failed to plan query")?;

    output.heading(&format!("Pipeline for `{}`", profile.collection));
    output.display(&PlanReport {
        collection: profile.collection.clone(),
        pipeline: pipeline.to_json(),
    })
}
