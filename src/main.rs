use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use log::info;

use dyn365_schema::api::DynamicsClient;
use dyn365_schema::cli::Cli;
use dyn365_schema::config::{CONNECTION_STRING_ENV, Config, ExtractOptions};
use dyn365_schema::extract::SchemaExtractor;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("dyn365-schema.log")?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    info!("Starting dyn365-schema");

    let config = Config::load(cli.config.as_deref())?;
    let options = ExtractOptions::resolve(&cli, &config, std::env::var(CONNECTION_STRING_ENV).ok())?;

    let client = DynamicsClient::connect(&options.connection)
        .await
        .context("Failed to connect to Dynamics 365")?
        .with_label_language(options.label_language);

    let extractor = SchemaExtractor::new(client, &options.output_folder).with_rules(options.rules);
    let summary = extractor
        .extract(&options.entities)
        .await
        .context("Schema extraction failed")?;

    println!("{}", "Extract Complete".green().bold());
    println!(
        "  {} entities, {} attributes, {} many-to-one, {} many-to-many -> {}",
        summary.entities,
        summary.attribute_files,
        summary.many_to_one_files,
        summary.many_to_many_files,
        extractor.output_root().display()
    );
    if !summary.missing_entities.is_empty() {
        println!(
            "  {} {}",
            "Not found:".yellow(),
            summary.missing_entities.join(", ")
        );
    }

    Ok(())
}
