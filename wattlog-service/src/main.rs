use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::SqlitePool;
use time::{macros::format_description, Date, Time};
use wattlog_client::db::{self, current_settings, update_settings};
use wattlog_client::domain::TariffSettings;
use wattlog_service::{
    analytics::Granularity,
    api,
    config::AppConfig,
    importer::import_file,
    metrics_server, observability,
    reconcile::Resolution,
    report::{period_report, Period, PeriodReport},
    sinks::ReconcilingSink,
    weather::{fill_weather_gaps, OpenMeteoClient},
};

#[derive(Debug, Parser)]
#[command(name = "wattlog", version, about = "Electricity meter readings: import, weather and reports")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import meter exports (.xlsx or .csv), one batch per file.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = ConflictPolicy::Report)]
        on_conflict: ConflictPolicy,
    },
    /// Fetch weather for every day that has readings but no weather.
    FillWeather,
    /// Print consumption, cost and solar figures for a period.
    Report {
        #[arg(long, value_parser = parse_date)]
        from: Date,
        #[arg(long, value_parser = parse_date)]
        to: Date,
        #[arg(long, value_enum, default_value_t = Granularity::Raw)]
        granularity: Granularity,
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Serve the JSON API.
    Serve,
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    Show,
    Set(SettingsArgs),
}

#[derive(Debug, Args)]
struct SettingsArgs {
    #[arg(long)]
    hp_cost: Option<f64>,
    #[arg(long)]
    hc_cost: Option<f64>,
    #[arg(long, value_parser = parse_hour_minute)]
    hp_start: Option<Time>,
    #[arg(long, value_parser = parse_hour_minute)]
    hp_end: Option<Time>,
    #[arg(long, allow_negative_numbers = true)]
    latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    longitude: Option<f64>,
    #[arg(long)]
    solar_wc: Option<f64>,
    #[arg(long)]
    solar_efficiency: Option<f64>,
    #[arg(long)]
    solar_loss: Option<f64>,
    #[arg(long)]
    solar_cost: Option<f64>,
}

impl SettingsArgs {
    fn apply_to(&self, mut s: TariffSettings) -> TariffSettings {
        s.hp_cost = self.hp_cost.unwrap_or(s.hp_cost);
        s.hc_cost = self.hc_cost.unwrap_or(s.hc_cost);
        s.hp_start = self.hp_start.unwrap_or(s.hp_start);
        s.hp_end = self.hp_end.unwrap_or(s.hp_end);
        s.latitude = self.latitude.unwrap_or(s.latitude);
        s.longitude = self.longitude.unwrap_or(s.longitude);
        s.solar_wc = self.solar_wc.unwrap_or(s.solar_wc);
        s.solar_efficiency = self.solar_efficiency.unwrap_or(s.solar_efficiency);
        s.solar_loss = self.solar_loss.unwrap_or(s.solar_loss);
        s.solar_cost = self.solar_cost.unwrap_or(s.solar_cost);
        s
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConflictPolicy {
    /// List conflicts and leave stored values alone.
    Report,
    Keep,
    TakeNew,
    Ignore,
}

impl ConflictPolicy {
    fn resolution(self) -> Option<Resolution> {
        match self {
            ConflictPolicy::Report => None,
            ConflictPolicy::Keep => Some(Resolution::KeepExisting),
            ConflictPolicy::TakeNew => Some(Resolution::TakeNew),
            ConflictPolicy::Ignore => Some(Resolution::Ignore),
        }
    }
}

fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s, format_description!("[year]-[month]-[day]")).map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_hour_minute(s: &str) -> Result<Time, String> {
    Time::parse(s, format_description!("[hour]:[minute]")).map_err(|e| format!("expected HH:MM: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let cfg = AppConfig::load()?;
    metrics_server::install()?;

    let pool = db::connect(&cfg.database.url, cfg.database.max_connections).await?;

    match cli.command {
        Command::Import { files, on_conflict } => import(&pool, &cfg, &files, on_conflict).await?,
        Command::FillWeather => {
            let settings = current_settings(&pool).await?;
            let provider = OpenMeteoClient::new(&cfg.weather)?;
            let report = fill_weather_gaps(&pool, &provider, settings.latitude, settings.longitude).await?;
            println!(
                "weather: {} day(s) missing, {} filled, {} skipped, {} samples saved",
                report.requested, report.filled, report.skipped, report.samples_saved
            );
        }
        Command::Report {
            from,
            to,
            granularity,
            json,
        } => {
            let report = period_report(&pool, Period::new(from, to)?, granularity).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Settings(SettingsCommand::Show) => {
            println!("{}", serde_json::to_string_pretty(&current_settings(&pool).await?)?);
        }
        Command::Settings(SettingsCommand::Set(args)) => {
            let settings = args.apply_to(current_settings(&pool).await?);
            update_settings(&pool, &settings).await.context("settings not saved")?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        Command::Serve => api::serve(pool, &cfg.server.bind_addr).await?,
    }

    Ok(())
}

async fn import(pool: &SqlitePool, cfg: &AppConfig, files: &[PathBuf], policy: ConflictPolicy) -> Result<()> {
    let sink = ReconcilingSink::new(pool.clone());

    for path in files {
        let report = import_file(pool, path, &cfg.import).await?;
        println!(
            "{}: {} inserted, {} unchanged, {} rejected, {} conflict(s)",
            path.display(),
            report.inserted,
            report.unchanged,
            report.rejected,
            report.conflicts.len()
        );
        for c in &report.conflicts {
            println!(
                "  conflict {} -> {}: stored {} kWh, file {} kWh",
                c.start_time, c.end_time, c.existing_value, c.new_value
            );
        }

        if let Some(resolution) = policy.resolution() {
            let changed = sink.resolve(&report.conflicts, resolution).await?;
            if changed > 0 {
                println!("  {changed} reading(s) replaced");
            }
        }
    }
    Ok(())
}

fn print_report(report: &PeriodReport) {
    let s = &report.summary;
    println!("period        {} .. {}", report.period.from, report.period.to);
    println!("samples       {} ({:?})", s.samples, report.granularity);
    println!("total         {:.3} kWh", s.total_kwh);
    println!("baseline      {:.3} kWh", s.baseline_kwh);
    println!("mean / std    {:.3} / {:.3} kWh", s.mean_kwh, s.std_dev_kwh);
    println!(
        "cost          {:.2} (HP {:.3} kWh = {:.2}, HC {:.3} kWh = {:.2})",
        s.cost.total_cost(),
        s.cost.hp_kwh,
        s.cost.hp_cost,
        s.cost.hc_kwh,
        s.cost.hc_cost
    );
    if let Some(at) = s.peak.at {
        println!("peak          {:.3} kWh at {at}", s.peak.value);
    }

    if let Some(solar) = &report.solar {
        println!("solar");
        println!("  production  {:.3} kWh", solar.production_kwh);
        println!(
            "  cost        {:.2} without, {:.2} with solar (saves {:.2})",
            solar.cost_without_solar.total_cost(),
            solar.net_cost_with_solar.total_cost(),
            solar.savings
        );
        println!(
            "  lost        {:.3} kWh (HP {:.3}, HC {:.3})",
            solar.lost_energy.total_kwh(),
            solar.lost_energy.hp_kwh,
            solar.lost_energy.hc_kwh
        );
        println!(
            "  self-consumption {:.1} %, coverage {:.1} %",
            solar.self_consumption_ratio, solar.coverage_ratio
        );
        if let Some(years) = solar.payback_years {
            println!("  payback     {years:.1} years");
        }
    }
}
