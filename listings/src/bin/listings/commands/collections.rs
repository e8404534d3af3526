use anyhow::Result;
use comfy_table::{Cell, Table};
use listings::CollectionProfile;
use listings::registry::ProfileRegistry;
use serde::Serialize;

use crate::context::CliContext;
use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, themed_table};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Profiles",
    commands: &[
        "listings collections",
        "listings --config planner.toml collections --output json",
    ],
}];

#[derive(Serialize)]
struct CollectionsReport {
    collections: Vec<CollectionProfile>,
}

impl TableDisplay for CollectionsReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(
            options,
            &["Name", "Collection", "Category", "Ranges", "Sorts", "Default Sort"],
        );
        for profile in &self.collections {
            let ranges = profile
                .ranges
                .iter()
                .map(|r| format!("{} ({})", r.name, r.path))
                .collect::<Vec<_>>()
                .join("\n");
            let sorts = profile.sorts.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ");
            table.add_row(vec![
                Cell::new(&profile.name),
                Cell::new(&profile.collection),
                Cell::new(&profile.category_field),
                Cell::new(ranges),
                Cell::new(sorts),
                Cell::new(&profile.default_sort),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.collections
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub async fn handle_collections(ctx: &CliContext, output: &OutputManager) -> Result<()> {
    let registry = ProfileRegistry::from_config(&ctx.config)?;
    match &ctx.config_path {
        Some(path) => output.key_value("Config", &path.display().to_string()),
        None => output.key_value("Config", "built-in defaults"),
    }
    for profile in registry.iter().filter(|p| ctx.config.collections.iter().any(|c| c.name == p.name)) {
        output.bullet(&format!("`{}` comes from the config file", profile.name));
    }
    output.display(&CollectionsReport {
        collections: registry.iter().cloned().collect(),
    })
}
