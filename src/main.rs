use toplists::config::DEFAULT_CONFIG_PATH;
use toplists::credentials::{CredentialProvider, EnvCredentials};
use toplists::fetcher::Fetcher;
use toplists::logging::init_tracing;
use toplists::options::parse_date;
use toplists::rate_limiter::RateLimiter;
use toplists::sources::{Enrich, FlixPatrolDetails, TmdbAPI, TraktAPI};
use toplists::{Config, Error, Pipeline, Result, RunOptions, RunOutcome};

use clap::{builder::BoolishValueParser, Parser};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info};

const STARTUP_FAILURE: u8 = 4;

/// Publishes the streaming top-10 rankings of FlixPatrol as Trakt lists.
#[derive(Debug, Parser)]
#[command(name = "toplists", version)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: PathBuf,

    /// Also publish the kids rankings
    #[arg(long, env = "KIDS_LIST", value_parser = BoolishValueParser::new())]
    kids: bool,

    /// Log every resolved ranking as a table
    #[arg(long, env = "PRINT_LISTS", value_parser = BoolishValueParser::new())]
    print_lists: bool,

    /// Only run these platforms (repeatable)
    #[arg(long = "platform", value_name = "NAME")]
    platforms: Vec<String>,

    /// Day of the dated rankings, defaults to yesterday
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = date_arg)]
    date: Option<String>,
}

fn date_arg(value: &str) -> std::result::Result<String, String> {
    parse_date(value).map_err(|err| err.to_string())
}

async fn run(args: Args) -> Result<u8> {
    let config = Config::from_file(&args.config)?;
    let credentials = EnvCredentials.credentials()?;

    let fetcher = Fetcher::new(&config.http)?;
    let trakt = TraktAPI::new(&config.trakt, &fetcher, &credentials)?;
    let limiter = RateLimiter::from_config(&config.tmdb);
    let details = FlixPatrolDetails::new(&config.flixpatrol, &fetcher)?;
    let tmdb = credentials
        .tmdb_api_key
        .as_deref()
        .map(|key| TmdbAPI::new(&config.tmdb, &fetcher, &limiter, key).with_details(&details));
    if tmdb.is_none() {
        info!("TMDB_API_KEY is not set, resolving by title search only");
    }
    let enricher = tmdb.as_ref().map(|tmdb| tmdb as &dyn Enrich);

    let pipeline = Pipeline::new(&config, &trakt, &fetcher, enricher)?;
    let options = RunOptions {
        kids: args.kids,
        print_lists: args.print_lists,
        platforms: args.platforms,
        date: args.date,
    };

    let report = pipeline.run(&options).await;
    report.log_summary();

    Ok(report.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if let Err(err) = init_tracing("info") {
        eprintln!("{}", err);
    }

    let code = match run(args).await {
        Ok(code) => code,
        Err(err @ Error::MissingCredential(_)) => {
            error!("{}", err);
            RunOutcome::CredentialsRejected.exit_code()
        }
        Err(err) => {
            error!("Could not start: {}", err);
            STARTUP_FAILURE
        }
    };

    ExitCode::from(code)
}
