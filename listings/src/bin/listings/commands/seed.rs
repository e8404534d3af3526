use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Table};
use listings::seed::DEFAULT_FIXTURE_COUNT;
use serde::Serialize;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, themed_table};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Fixtures",
    commands: &[
        "listings seed                         # Seed every empty collection",
        "listings seed hotels events --count 40",
    ],
}];

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Collections to seed (all when omitted)
    pub collections: Vec<String>,

    /// Documents per collection
    #[arg(long, default_value_t = DEFAULT_FIXTURE_COUNT)]
    pub count: usize,

    /// Skip index creation
    #[arg(long)]
    pub no_indexes: bool,
}

#[derive(Serialize)]
struct SeedRow {
    collection: String,
    inserted: u64,
    indexes: usize,
}

#[derive(Serialize)]
struct SeedReport {
    collections: Vec<SeedRow>,
}

impl TableDisplay for SeedReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Collection", "Inserted", "Indexes"]);
        for row in &self.collections {
            let inserted = if row.inserted == 0 {
                "skipped (not empty)".to_string()
            } else {
                row.inserted.to_string()
            };
            table.add_row(vec![Cell::new(&row.collection), Cell::new(inserted), Cell::new(row.indexes)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.collections
            .iter()
            .map(|r| format!("{}={}", r.collection, r.inserted))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub async fn handle_seed(args: SeedArgs, ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let client = ctx.mongo_client().await?;
    let names: Vec<String> = if args.collections.is_empty() {
        client.profiles().map(|p| p.name.clone()).collect()
    } else {
        args.collections
    };

    let mut report = SeedReport {
        collections: Vec::with_capacity(names.len()),
    };
    for name in &names {
        let handle = client.collection(name)?;
        let indexes = if args.no_indexes {
            0
        } else {
            handle
                .ensure_indexes()
                .await
                .with_context(|| format!("Failed to create indexes on `{}`", handle.profile().collection))?
                .len()
        };
        let inserted = handle
            .seed_if_empty(args.count)
            .await
            .with_context(|| format!("Failed to seed `{}`", handle.profile().collection))?;
        report.collections.push(SeedRow {
            collection: handle.profile().collection.clone(),
            inserted,
            indexes,
        });
    }

    let total: u64 = report.collections.iter().map(|r| r.inserted).sum();
    output.success(&format!("Inserted {} documents into {} collections", total, names.len()));
    output.display(&report)
}
