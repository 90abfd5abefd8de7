//! snow-sheets - loads Snowflake query results into Google Sheets.

use snow_sheets::cli::{Cli, Command};
use snow_sheets::config::{ConfigDocument, JobConfig};
use snow_sheets::error::{AppError, Result};
use snow_sheets::logging;
use snow_sheets::login::{LoginRetrier, TerminalPrompt};
use snow_sheets::notify::WebhookNotifier;
use snow_sheets::pipeline::Orchestrator;
use snow_sheets::sheets::GoogleSheetsClient;
use snow_sheets::warehouse::{QueryResult, SnowflakeConnector, WarehouseCredentials};
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => logging::init_file_logging(path),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(&cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    info!("Loading config from: {}", cli.config.display());
    let document = ConfigDocument::load_from_file(&cli.config)?;

    // clap already folds APP_PROFILE into --profile
    let resolved = document.resolve(cli.profile.as_deref(), None)?;
    println!("Active profile: {}", resolved.profile);
    let config = resolved.job_config()?;

    match cli.command() {
        Command::Run => run_job(&config).await,
        Command::Peek {
            worksheet,
            range,
            no_header,
        } => peek(&config, &worksheet, range.as_deref(), !no_header).await,
    }
}

async fn run_job(config: &JobConfig) -> Result<()> {
    let credentials =
        WarehouseCredentials::load_from_file(&config.snowflake.service_account_json)?;
    info!("Warehouse: {}", credentials.display_string());

    let sheets = GoogleSheetsClient::connect(&config.google)?;
    info!("Spreadsheet: {}", sheets.spreadsheet_id());
    let notifier = config
        .alerts
        .webhook_url
        .as_deref()
        .map(WebhookNotifier::new)
        .transpose()?;

    let connector = SnowflakeConnector;
    let prompt = TerminalPrompt;
    let mut retrier = LoginRetrier::new(&connector, &credentials);
    if config.snowflake.require_passcode {
        retrier = retrier.with_passcode_prompt(&prompt);
    }

    let outcome = retrier.login().await;
    let connected = outcome.is_connected();
    let session = match outcome.session {
        Some(session) if connected => session,
        _ => {
            return Err(AppError::auth(format!(
                "Could not log in to Snowflake as {} after {} attempt(s)",
                outcome.user, outcome.attempts
            )))
        }
    };

    let mut orchestrator =
        Orchestrator::new(&*session, &sheets).with_policy(config.on_sink_error);
    if let Some(notifier) = &notifier {
        orchestrator = orchestrator.with_notifier(notifier);
    }

    let result = orchestrator.run(&config.queries).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close Snowflake session: {}", e);
    }

    let summary = result?;
    println!(
        "Done: {} of {} queries written",
        summary.written(),
        summary.outcomes.len()
    );
    for failed in summary.failed() {
        println!("  not written: {} -> {}", failed.file.display(), failed.worksheet);
    }
    Ok(())
}

async fn peek(
    config: &JobConfig,
    worksheet: &str,
    range: Option<&str>,
    assume_header: bool,
) -> Result<()> {
    let sheets = GoogleSheetsClient::connect(&config.google)?;
    let table = sheets.read_values(worksheet, range, assume_header).await?;
    print_table(&table);
    Ok(())
}

fn print_table(table: &QueryResult) {
    println!("{}", table.column_names().join("\t"));
    for row in &table.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| if v.is_null() { String::new() } else { v.to_string() })
            .collect();
        println!("{}", cells.join("\t"));
    }
    println!("({} rows)", table.row_count());
}
