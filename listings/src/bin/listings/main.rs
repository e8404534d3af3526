mod commands;
mod context;
mod examples;
mod output;
mod theme;

use std::fmt::Write;
use std::io::{self, Write as IoWrite};
use std::path::PathBuf;

use anyhow::Result;
use clap::{
    ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{
        Styles,
        styling::{Color as ClapColor, RgbColor, Style},
    },
    error::ErrorKind,
};
use colored::control::ShouldColorize;

use commands::{
    collections::handle_collections,
    indexes::{IndexesArgs, handle_indexes},
    plan::{PlanArgs, handle_plan},
    search::{SearchArgs, handle_search},
    seed::{SeedArgs, handle_seed},
};
use context::CliContext;
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{GLYPHS, PALETTE, Rgb, paint};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("LISTINGS_CONFIG", "Path to the planner TOML config"),
    ("MONGODB_URI", "MongoDB connection string"),
    ("MONGODB_DATABASE", "Database holding the listing collections"),
    ("RUST_LOG", "Log filter (e.g. listings=trace)"),
];

#[derive(Parser)]
#[command(name = "listings")]
#[command(version)]
#[command(
    about = "Plan and run listing searches against MongoDB",
    long_about = r#"Listing search CLI that provides:

• Inspection of the aggregation pipeline compiled for a set of search parameters
• Searches against MongoDB or in-memory fixtures
• Explicit fixture seeding and index provisioning

Commands:
  plan         Print the pipeline for a search
  search       Run a search and print one page of results
  seed         Insert fixture listings into empty collections
  indexes      Create the geo, text and filter indexes
  collections  List the configured collection profiles
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Planner config file
    #[arg(long, global = true, env = "LISTINGS_CONFIG")]
    config: Option<PathBuf>,

    /// MongoDB connection string
    #[arg(long, global = true, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    mongodb_uri: String,

    /// Database name
    #[arg(long, global = true, env = "MONGODB_DATABASE", default_value = "listings")]
    database: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn parse_with_styles() -> Self {
        let command = build_cli_command();
        let matches = match command.styles(help_styles()).try_get_matches() {
            Ok(matches) => matches,
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = print_blank_line_stdout();
                    if let Err(print_err) = err.print()
                        && print_err.kind() != io::ErrorKind::BrokenPipe
                    {
                        eprintln!("Failed to display help: {print_err}");
                    }
                    let _ = print_blank_line_stdout();
                    std::process::exit(0);
                }
                ErrorKind::MissingSubcommand | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                    handle_missing_subcommand(err);
                }
                _ => err.exit(),
            },
        };
        Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }
}

fn handle_missing_subcommand(error: clap::error::Error) -> ! {
    let mut command = build_cli_command();
    let command_name = command
        .get_display_name()
        .unwrap_or_else(|| command.get_name())
        .to_string();

    let _ = print_blank_line_stderr();
    eprintln!("error: '{command_name}' requires a subcommand but one was not provided");
    let _ = print_blank_line_stderr();

    command = command.styles(help_styles());

    let mut stderr = io::stderr();
    if command.write_long_help(&mut stderr).is_ok() {
        let _ = IoWrite::write_all(&mut stderr, b"\n");
        let _ = IoWrite::flush(&mut stderr);
    }

    std::process::exit(error.exit_code());
}

fn build_cli_command() -> Command {
    let use_color = detect_color_support();
    let appendix = render_top_level_appendix(use_color);
    let mut command = Cli::command().after_long_help(appendix);
    command = command.color(if use_color { ColorChoice::Auto } else { ColorChoice::Never });
    attach_command_examples(&mut command, use_color);
    command
}

fn attach_command_examples(command: &mut Command, use_color: bool) {
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            let help_text = render_examples(example.groups, use_color);
            *subcommand = subcommand.clone().after_long_help(help_text);
        }
    }
}

/// A bold heading followed by indented lines, as appended to long help.
fn help_section(heading: &str, lines: impl IntoIterator<Item = String>, use_color: bool) -> String {
    let mut buffer = paint(heading, PALETTE.heading, true, use_color);
    buffer.push('\n');
    for line in lines {
        let _ = writeln!(buffer, "  {line}");
    }
    buffer
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let arrow = paint(GLYPHS.arrow, PALETTE.command, false, use_color);
    let lines = groups.iter().enumerate().flat_map(|(index, group)| {
        let spacer = (index > 0).then(String::new);
        let title = paint(group.title, PALETTE.label, true, use_color);
        let commands = group
            .commands
            .iter()
            .map(|command| format!("  {arrow} {}", paint(command, PALETTE.command, false, use_color)));
        spacer.into_iter().chain(std::iter::once(title)).chain(commands).collect::<Vec<_>>()
    });
    help_section("Examples:", lines, use_color)
}

fn render_top_level_appendix(use_color: bool) -> String {
    let width = ENVIRONMENT_VARIABLES.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let variables = ENVIRONMENT_VARIABLES.iter().map(|(key, description)| {
        format!(
            "{}  {}",
            paint(&format!("{key:<width$}"), PALETTE.label, true, use_color),
            paint(description, PALETTE.text, false, use_color)
        )
    });
    let mut buffer = help_section("Environment Variables:", variables, use_color);
    let _ = writeln!(
        buffer,
        "\n{} {}",
        paint("Tip:", PALETTE.heading, true, use_color),
        paint("run 'listings collections' to see which profiles a search can target.", PALETTE.dim, false, use_color)
    );
    buffer
}

fn print_blank_line_stdout() -> io::Result<()> {
    let mut stdout = io::stdout();
    IoWrite::write_all(&mut stdout, b"\n")?;
    IoWrite::flush(&mut stdout)
}

fn print_blank_line_stderr() -> io::Result<()> {
    let mut stderr = io::stderr();
    IoWrite::write_all(&mut stderr, b"\n")?;
    IoWrite::flush(&mut stderr)
}

fn detect_color_support() -> bool {
    ShouldColorize::from_env().should_colorize()
}

fn help_styles() -> Styles {
    let tone = |rgb: Rgb| Style::new().fg_color(Some(ClapColor::Rgb(RgbColor(rgb.0, rgb.1, rgb.2))));
    Styles::styled()
        .usage(tone(PALETTE.heading).bold())
        .header(tone(PALETTE.heading).bold())
        .literal(tone(PALETTE.command))
        .placeholder(tone(PALETTE.dim))
        .valid(tone(PALETTE.ok))
        .invalid(tone(PALETTE.caution))
        .error(tone(PALETTE.failure).bold())
}

#[derive(Subcommand)]
enum Commands {
    /// Print the aggregation pipeline compiled for a search
    Plan(PlanArgs),

    /// Run a search and print one page of results
    Search(SearchArgs),

    /// Insert fixture listings into empty collections
    Seed(SeedArgs),

    /// Create the indexes each collection's pipelines rely on
    Indexes(IndexesArgs),

    /// List configured collection profiles
    Collections,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_with_styles();
    init_logging(cli.verbose);

    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output.clone(),
        quiet: cli.quiet,
        no_color: cli.no_color,
    });
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = execute(cli, &output).await {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

async fn execute(cli: Cli, output: &OutputManager) -> Result<()> {
    let ctx = CliContext::load(cli.config, cli.mongodb_uri, cli.database)?;

    match cli.command {
        Commands::Plan(args) => handle_plan(args, &ctx, output).await,
        Commands::Search(args) => handle_search(args, &ctx, output).await,
        Commands::Seed(args) => handle_seed(args, &ctx, output).await,
        Commands::Indexes(args) => handle_indexes(args, &ctx, output).await,
        Commands::Collections => handle_collections(&ctx, output).await,
    }
}
