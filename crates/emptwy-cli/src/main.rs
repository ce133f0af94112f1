// ============================================================================
// emptwy: erase a Twitter timeline page from the command line
// ============================================================================
// Usage:
//   emptwy --consumer-key KEY --consumer-secret SECRET delete SCREEN_NAME
//   emptwy [auth flags] delete --page 2 --count 100 --num-workers 8 SCREEN_NAME
//   emptwy [auth flags] request GET https://api.twitter.com/1/account/verify_credentials.json
//
// Consumer and token flags may also come from EMPTWY_* variables or .env.
// ============================================================================

mod prompt;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use emptwy_core::auth::{
    AuthorizedClient, ConsumerCredentials, OAuthEndpoints, OAuthHandshake, TokenPair,
    DEFAULT_ACCESS_TOKEN_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_REQUEST_TOKEN_URL,
};
use emptwy_core::executor::DEFAULT_API_BASE_URL;
use emptwy_core::pipeline::DEFAULT_NUM_WORKERS;
use emptwy_core::{
    is_success_status, ApiConfig, DeletionPipeline, PipelineConfig, RetryPolicy, TimelineQuery,
    TwitterExecutor, MAX_TIMELINE_COUNT,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::prompt::TerminalPrompt;

/// OAuth 1.0a command-line client and timeline eraser
#[derive(Parser)]
#[command(name = "emptwy", version, about = "Delete Twitter timeline pages through OAuth 1.0a")]
struct Cli {
    #[command(flatten)]
    auth: AuthArgs,

    /// Show debug information
    #[arg(long, global = true)]
    debug: bool,

    /// Only show fatal errors
    #[arg(long, global = true, conflicts_with = "debug")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AuthArgs {
    #[arg(long, default_value = DEFAULT_REQUEST_TOKEN_URL)]
    request_token_url: String,

    #[arg(long, default_value = DEFAULT_ACCESS_TOKEN_URL)]
    access_token_url: String,

    #[arg(long, default_value = DEFAULT_AUTHORIZE_URL)]
    authorize_url: String,

    /// Twitter REST API root
    #[arg(long, default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    #[arg(long, env = "EMPTWY_CONSUMER_KEY", hide_env_values = true)]
    consumer_key: String,

    #[arg(long, env = "EMPTWY_CONSUMER_SECRET", hide_env_values = true)]
    consumer_secret: String,

    /// Already obtained Request Token (skips the first OAuth leg)
    #[arg(long, env = "EMPTWY_REQUEST_TOKEN_KEY", hide_env_values = true)]
    request_token_key: Option<String>,

    #[arg(long, env = "EMPTWY_REQUEST_TOKEN_SECRET", hide_env_values = true)]
    request_token_secret: Option<String>,

    /// Already obtained Access Token (skips the handshake)
    #[arg(long, env = "EMPTWY_ACCESS_TOKEN_KEY", hide_env_values = true)]
    access_token_key: Option<String>,

    #[arg(long, env = "EMPTWY_ACCESS_TOKEN_SECRET", hide_env_values = true)]
    access_token_secret: Option<String>,

    /// Per-request timeout in seconds (default: none)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete every tweet on one page of a user timeline
    Delete {
        /// Concurrent deletion workers
        #[arg(long, default_value_t = DEFAULT_NUM_WORKERS)]
        num_workers: usize,

        /// Tweets per timeline page, in (0, 200]
        #[arg(long, alias = "twitter-statuses-count", default_value_t = i64::from(MAX_TIMELINE_COUNT), allow_negative_numbers = true)]
        count: i64,

        /// Zero-based timeline page
        #[arg(long, alias = "twitter-statuses-page", default_value_t = 0, allow_negative_numbers = true)]
        page: i64,

        /// Leave retweets out of the fetched page
        #[arg(long)]
        no_retweets: bool,

        /// Give up on a tweet after this many failed deletes (default: never)
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Base backoff before re-queueing a failed delete, doubled per failure
        #[arg(long, default_value_t = 0)]
        retry_delay_ms: u64,

        /// Print the access token so later runs can pass --access-token-*
        #[arg(long)]
        print_token: bool,

        /// Owner of the timeline
        screen_name: String,
    },

    /// Send one signed request and write the response body
    Request {
        /// Write the body here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        outfile: Option<PathBuf>,

        /// Resource HTTP method
        method: String,

        /// Resource URL
        url: String,
    },
}

/// Crate log levels for `--debug` / `--quiet`; fatal errors still reach
/// stderr through `main`'s returned error
fn default_log_directives(debug: bool, quiet: bool) -> String {
    let level = if debug {
        "debug"
    } else if quiet {
        "off"
    } else {
        "info"
    };
    format!("emptwy={},emptwy_core={}", level, level)
}

fn init_logging(debug: bool, quiet: bool) {
    // RUST_LOG, when set, wins over the flags
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directives(debug, quiet)));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.debug, cli.quiet);

    if let Err(e) = dotenv {
        debug!("No .env file loaded: {}", e);
    }

    match cli.command {
        Commands::Delete {
            num_workers,
            count,
            page,
            no_retweets,
            max_attempts,
            retry_delay_ms,
            print_token,
            screen_name,
        } => {
            let query = TimelineQuery::new(screen_name)
                .page(page)
                .count(count)
                .include_retweets(!no_retweets);
            let config = PipelineConfig {
                num_workers,
                retry: RetryPolicy {
                    max_attempts,
                    base_delay_ms: retry_delay_ms,
                    ..Default::default()
                },
            };
            cmd_delete(&cli.auth, query, config, print_token).await
        }
        Commands::Request {
            outfile,
            method,
            url,
        } => cmd_request(&cli.auth, &method, &url, outfile).await,
    }
}

fn api_config(auth: &AuthArgs) -> ApiConfig {
    ApiConfig {
        base_url: auth.api_url.clone(),
        timeout_secs: auth.timeout,
        ..Default::default()
    }
}

/// Run the handshake once, prompting the user only if no token was given
async fn authorize(auth: &AuthArgs) -> Result<AuthorizedClient> {
    let request_token = TokenPair::from_parts(
        auth.request_token_key.clone(),
        auth.request_token_secret.clone(),
        "request token",
    )?;
    let access_token = TokenPair::from_parts(
        auth.access_token_key.clone(),
        auth.access_token_secret.clone(),
        "access token",
    )?;

    let endpoints = OAuthEndpoints {
        request_token_url: auth.request_token_url.clone(),
        access_token_url: auth.access_token_url.clone(),
        authorize_url: auth.authorize_url.clone(),
    };
    let consumer = ConsumerCredentials::new(&auth.consumer_key, &auth.consumer_secret);
    let http = api_config(auth).http_client()?;

    let mut handshake = OAuthHandshake::new(endpoints, consumer).with_http_client(http);
    if let Some(token) = request_token {
        handshake = handshake.with_request_token(token);
    }
    if let Some(token) = access_token {
        handshake = handshake.with_access_token(token);
    }

    let client = handshake
        .build_authorized_client(&TerminalPrompt)
        .await
        .context("OAuth authorization failed")?;
    Ok(client)
}

async fn cmd_delete(
    auth: &AuthArgs,
    query: TimelineQuery,
    config: PipelineConfig,
    print_token: bool,
) -> Result<()> {
    // Fail on bad input before bothering the user with a prompt
    query.validate()?;
    config.validate()?;

    info!(
        "Attempting to delete {} tweets from user {} at page {}",
        query.count, query.screen_name, query.page
    );

    let client = authorize(auth).await?;
    if print_token {
        println!("{}", client.access_token().to_query_string());
    }

    let base_url = auth.api_url.clone();
    let pipeline = DeletionPipeline::new(
        move || TwitterExecutor::new(client.clone(), base_url.clone()),
        config,
    );

    let report = pipeline
        .run(&query)
        .await
        .with_context(|| format!("Deleting tweets of {} failed", query.screen_name))?;

    info!(
        "Deleted {} of {} tweets from user {}",
        report.deleted.len(),
        report.queued,
        query.screen_name
    );
    if !report.abandoned.is_empty() {
        warn!(
            "Gave up on {} tweets: {:?}",
            report.abandoned.len(),
            report.abandoned
        );
    }
    Ok(())
}

async fn cmd_request(
    auth: &AuthArgs,
    method: &str,
    url: &str,
    outfile: Option<PathBuf>,
) -> Result<()> {
    let method = reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method '{}'", method))?;

    let client = authorize(auth).await?;

    debug!("Requesting resource: {} {}", method, url);
    let response = client.request(method, url, &[]).await?;
    info!("Response status: {}", response.status);
    if !is_success_status(response.status) {
        warn!("Request failed with HTTP {}", response.status);
    }

    match outfile {
        Some(path) => std::fs::write(&path, response.body.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(response.body.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use emptwy_core::EmptwyError;
    use std::time::Duration;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_delete_defaults() {
        let cli = Cli::try_parse_from([
            "emptwy",
            "--consumer-key",
            "ck",
            "--consumer-secret",
            "cs",
            "delete",
            "jack",
        ])
        .unwrap();

        assert_eq!(cli.auth.request_token_url, DEFAULT_REQUEST_TOKEN_URL);
        assert_eq!(cli.auth.api_url, DEFAULT_API_BASE_URL);
        match cli.command {
            Commands::Delete {
                num_workers,
                count,
                page,
                no_retweets,
                max_attempts,
                screen_name,
                ..
            } => {
                assert_eq!(num_workers, 5);
                assert_eq!(count, 200);
                assert_eq!(page, 0);
                assert!(!no_retweets);
                assert_eq!(max_attempts, None);
                assert_eq!(screen_name, "jack");
            }
            Commands::Request { .. } => panic!("expected delete"),
        }
    }

    #[test]
    fn test_request_with_outfile() {
        let cli = Cli::try_parse_from([
            "emptwy",
            "--consumer-key",
            "ck",
            "--consumer-secret",
            "cs",
            "--quiet",
            "request",
            "-o",
            "out.json",
            "GET",
            "https://api.twitter.com/1/account/verify_credentials.json",
        ])
        .unwrap();

        assert!(cli.quiet);
        match cli.command {
            Commands::Request {
                outfile,
                method,
                url,
            } => {
                assert_eq!(outfile, Some(PathBuf::from("out.json")));
                assert_eq!(method, "GET");
                assert!(url.ends_with("verify_credentials.json"));
            }
            Commands::Delete { .. } => panic!("expected request"),
        }
    }

    #[test]
    fn test_debug_and_quiet_conflict() {
        let result = Cli::try_parse_from([
            "emptwy",
            "--consumer-key",
            "ck",
            "--consumer-secret",
            "cs",
            "--debug",
            "--quiet",
            "delete",
            "jack",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_directives() {
        assert_eq!(default_log_directives(false, false), "emptwy=info,emptwy_core=info");
        assert_eq!(default_log_directives(true, false), "emptwy=debug,emptwy_core=debug");
        assert_eq!(default_log_directives(false, true), "emptwy=off,emptwy_core=off");
    }

    #[tokio::test]
    async fn test_zero_workers_rejected_before_handshake() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let request_token_url = format!(
            "http://{}/oauth/request_token",
            listener.local_addr().unwrap()
        );
        let cli = Cli::try_parse_from([
            "emptwy",
            "--consumer-key",
            "ck",
            "--consumer-secret",
            "cs",
            "--request-token-url",
            request_token_url.as_str(),
            "delete",
            "--num-workers",
            "0",
            "jack",
        ])
        .unwrap();

        let config = PipelineConfig {
            num_workers: 0,
            ..Default::default()
        };
        let err = tokio::time::timeout(
            Duration::from_secs(2),
            cmd_delete(&cli.auth, TimelineQuery::new("jack"), config, false),
        )
        .await
        .expect("validation must not wait on the handshake")
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EmptwyError>(),
            Some(EmptwyError::Validation(_))
        ));

        // Nothing ever dialed the request-token endpoint
        let accepted = tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(accepted.is_err());
    }

    #[tokio::test]
    async fn test_half_token_pair_rejected_before_network() {
        let cli = Cli::try_parse_from([
            "emptwy",
            "--consumer-key",
            "ck",
            "--consumer-secret",
            "cs",
            "--access-token-key",
            "only-the-key",
            "--request-token-url",
            "http://127.0.0.1:9/oauth/request_token",
            "delete",
            "jack",
        ])
        .unwrap();

        let err = authorize(&cli.auth).await.unwrap_err();
        assert!(err.to_string().contains("access token"));
    }
}
