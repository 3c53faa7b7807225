// src/main.rs - alarm-archive admin tool
use alarm_archive::{
    AlarmDocument, AlarmTableView, AlarmsFromStore, ArchiveConfig, BulkUpsertClient, ElasticClient,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "alarm-archive")]
#[command(about = "Alarm history archive administration", long_about = None)]
#[command(version = alarm_archive::VERSION)]
struct Cli {
    /// Configuration file; built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk insert a JSON array of alarm documents
    Reindex {
        /// JSON file holding the documents
        file: PathBuf,
    },
    /// Print the alarms that existed at a point in time
    View {
        /// Query time, epoch milliseconds
        #[arg(short, long)]
        time: i64,
    },
    /// Validate the configuration file
    CheckConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<ArchiveConfig> {
    match path {
        Some(path) => ArchiveConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => {
            let config = ArchiveConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn reindex(config: &ArchiveConfig, file: &PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let documents: Vec<AlarmDocument> =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", file.display()))?;
    let total = documents.len();

    let client = ElasticClient::new(config)?;
    info!("Re-indexing {} documents into {}", total, config.index_prefix);

    match client.bulk_upsert(documents).await {
        Ok(()) => {
            println!("Indexed {} documents", total);
            Ok(())
        }
        Err(failure) => {
            for item in &failure.failed {
                println!(
                    "FAILED id={} reduction-key={} index={} status={} reason={}",
                    item.id,
                    item.reduction_key,
                    item.index,
                    item.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                    item.reason
                );
            }
            println!("Indexed {} of {} documents", total - failure.failed.len(), total);
            Err(failure.into())
        }
    }
}

async fn view(config: &ArchiveConfig, time: i64) -> Result<()> {
    let client = ElasticClient::new(config)?;
    let table: AlarmTableView = client.table_view().await?;
    let alarms = table.alarms_at_time(time);

    println!("{} alarms at {}", alarms.len(), time);
    for alarm in alarms {
        let view = alarm_archive::AlarmDocumentView::new(alarm, time);
        let mut related: Vec<&str> = view.related_reduction_keys().into_iter().collect();
        related.sort_unstable();
        println!(
            "  #{} {} severity={} ack={} related=[{}]",
            alarm.id,
            alarm.reduction_key,
            view.severity().map(|s| s.label()).unwrap_or("-"),
            view.ack_user().unwrap_or("-"),
            related.join(", ")
        );
    }

    match table.situation_at_time(time) {
        Some(situation) => println!("First situation: {}", situation.alarm().reduction_key),
        None => println!("No situations"),
    }
    match table.problem_alarm_at_time(time) {
        Ok(problem) => println!("First problem: {}", problem),
        Err(e) => println!("{}", e),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    alarm_archive::telemetry::init_logging();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match &cli.command {
        Commands::Reindex { file } => reindex(&config, file).await?,
        Commands::View { time } => view(&config, *time).await?,
        Commands::CheckConfig => {
            println!("Configuration OK");
            println!("  store:    {}", config.elastic_url);
            println!("  indices:  {}", alarm_archive::IndexStrategy::wildcard(&config.index_prefix));
            println!("  batching: {} docs / {} ms", config.batch_size, config.max_fill_wait_ms);
            println!("  queue:    {}", config.queue_capacity);
        }
    }

    Ok(())
}
