use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Table};
use listings::indexes::IndexPlan;
use listings::registry::ProfileRegistry;
use serde::Serialize;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, themed_table};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Index Provisioning",
    commands: &[
        "listings indexes --dry-run            # Show the indexes each collection needs",
        "listings indexes hotels restaurants   # Create them on MongoDB",
    ],
}];

#[derive(Args, Debug)]
pub struct IndexesArgs {
    /// Collections to index (all when omitted)
    pub collections: Vec<String>,

    /// Print the index plan without connecting
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
struct IndexRow {
    collection: String,
    name: String,
    keys: String,
}

#[derive(Serialize)]
struct IndexReport {
    indexes: Vec<IndexRow>,
}

impl TableDisplay for IndexReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Collection", "Index", "Keys"]);
        for row in &self.indexes {
            table.add_row(vec![Cell::new(&row.collection), Cell::new(&row.name), Cell::new(&row.keys)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.indexes.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(" ")
    }
}

pub async fn handle_indexes(args: IndexesArgs, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let registry = ProfileRegistry::from_config(&ctx.config)?;
    let plans: Vec<IndexPlan> = if args.collections.is_empty() {
        registry.iter().map(IndexPlan::for_profile).collect()
    } else {
        args.collections
            .iter()
            .map(|name| registry.resolve(name).map(IndexPlan::for_profile))
            .collect::<Result<_, _>>()?
    };

    let mut report = IndexReport { indexes: Vec::new() };
    for plan in &plans {
        for spec in &plan.indexes {
            report.indexes.push(IndexRow {
                collection: plan.collection.clone(),
                name: spec.name.clone(),
                keys: spec.keys_document().to_string(),
            });
        }
    }

    if args.dry_run {
        output.info("Dry run: no indexes were created");
        return output.display(&report);
    }

    let client = ctx.mongo_client().await?;
    for plan in &plans {
        let handle = client.collection(&plan.collection)?;
        let created = handle.ensure_indexes().await?;
        output.success(&format!("`{}`: {}", plan.collection, created.join(", ")));
    }
    output.display(&report)
}
