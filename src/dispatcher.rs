//! Routes parsed commands to the report pipeline and prints the results.

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use crate::cli::{formatters, Cli, Commands, FxCommands, Modelo100Commands, Modelo720Commands, RunArgs};
use dec_renta::config::AppConfig;
use dec_renta::fx::{cache::clear_cache, DenseRateCalendar, EcbRateSource, RateCache};
use dec_renta::importers::{resolve_inputs, resolve_positions_inputs};
use dec_renta::metadata::provider_from_config;
use dec_renta::report::{generate_report_720, generate_reports};

pub fn dispatch_command(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let json_output = cli.json;

    match cli.command {
        Commands::Modelo100 { action } => match action {
            Modelo100Commands::Run {
                args,
                pattern_transactions,
                pattern_realized,
            } => dispatch_modelo_100(
                &config,
                &args,
                &pattern_transactions,
                &pattern_realized,
                json_output,
            ),
        },
        Commands::Modelo720 { action } => match action {
            Modelo720Commands::Run {
                args,
                pattern_positions,
                metadata_file,
                no_remote_metadata,
            } => dispatch_modelo_720(
                &config,
                &args,
                &pattern_positions,
                metadata_file,
                no_remote_metadata,
                json_output,
            ),
        },
        Commands::Fx { action } => match action {
            FxCommands::Show { year, refresh } => dispatch_fx_show(&config, year, refresh),
            FxCommands::ClearCache { year } => dispatch_fx_clear(&config, year),
        },
    }
}

fn rate_cache(config: &AppConfig) -> Result<RateCache<EcbRateSource>> {
    let source = EcbRateSource::new(&config.fx)?;
    Ok(RateCache::new(config.fx.clone(), source))
}

fn out_dir(config: &AppConfig, args: &RunArgs) -> PathBuf {
    args.out_dir.clone().unwrap_or_else(|| config.out_dir())
}

fn dispatch_modelo_100(
    config: &AppConfig,
    args: &RunArgs,
    pattern_transactions: &str,
    pattern_realized: &str,
    json_output: bool,
) -> Result<()> {
    let inputs = resolve_inputs(
        &args.data_dir,
        pattern_transactions,
        pattern_realized,
        args.year,
    )?;
    info!("Generating Modelo 100 figures for {}", inputs.year);

    let cache = rate_cache(config)?;
    let report = generate_reports(&cache, &inputs, &out_dir(config, args), args.refresh_fx)?;

    if json_output {
        println!("{}", formatters::format_income_json(&report));
    } else {
        print!("{}", formatters::format_income_table(&report));
    }
    Ok(())
}

fn dispatch_modelo_720(
    config: &AppConfig,
    args: &RunArgs,
    pattern_positions: &str,
    metadata_file: Option<PathBuf>,
    no_remote_metadata: bool,
    json_output: bool,
) -> Result<()> {
    let inputs = resolve_positions_inputs(&args.data_dir, pattern_positions, args.year)?;
    info!("Generating Modelo 720 draft for {}", inputs.year);

    let mut metadata_config = config.metadata.clone();
    if let Some(path) = metadata_file {
        metadata_config.path = path;
    }
    if no_remote_metadata {
        metadata_config.remote_enrichment = false;
    }
    let provider = provider_from_config(&metadata_config)?;

    let cache = rate_cache(config)?;
    let report = generate_report_720(
        &cache,
        &inputs,
        provider.as_ref(),
        &out_dir(config, args),
        args.refresh_fx,
    )?;

    if json_output {
        println!("{}", formatters::format_720_json(&report));
    } else {
        print!("{}", formatters::format_720_table(&report));
    }
    Ok(())
}

fn dispatch_fx_show(config: &AppConfig, year: i32, refresh: bool) -> Result<()> {
    let cache = rate_cache(config)?;
    let calendar = DenseRateCalendar::build(&cache, year, refresh)?;
    print!(
        "{}",
        formatters::format_rates_table(&calendar, &cache.cache_path(year))
    );
    Ok(())
}

fn dispatch_fx_clear(config: &AppConfig, year: Option<i32>) -> Result<()> {
    info!("Clearing FX cache {:?}", year);
    let removed = clear_cache(&config.fx.cache_dir, year)?;
    println!(
        "{} Removed {} cached rate file(s) from {}",
        "✓".green().bold(),
        removed,
        config.fx.cache_dir.display()
    );
    Ok(())
}
