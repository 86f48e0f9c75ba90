//! garden: command line client for the community garden API
//!
//! Usage:
//!   garden login -u admin@horta.org -p secret
//!   garden list seeds --search alface
//!   garden board <ground-id>
//!   garden assign <ground-id> A1 --volunteer <people-id> --start 2024-03-01
//!
//! Settings come from the environment / `.env` (see `config`).

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;

use garden_client::api::{Api, IndexQuery};
use garden_client::beds::BedStatus;
use garden_client::config::Config;
use garden_client::error::ApiResult;
use garden_client::guard::{GuardError, Subscription};
use garden_client::modal::{AssignmentForm, VolunteerEntry};
use garden_client::notify::{Disposition, Notifications};
use garden_client::session::Credentials;
use garden_client::terrain::TerrainBoard;

#[derive(Parser)]
#[command(name = "garden")]
#[command(about = "CLI for the community garden API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Overrides GARDEN_API_BASE_URL
    #[arg(long)]
    url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    Login {
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },
    Logout,
    /// Probes the stored session and shows who is signed in
    Whoami,
    List {
        resource: ResourceName,
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Shows the beds of a ground with their status
    Board { ground_id: String },
    /// Assigns volunteers to a bed in one batch
    Assign {
        ground_id: String,
        bed_label: String,
        #[arg(short, long = "volunteer", required = true)]
        volunteers: Vec<String>,
        /// Defaults to the first volunteer
        #[arg(short, long)]
        responsible: Option<String>,
        #[arg(long)]
        start: NaiveDate,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResourceName {
    Peoples,
    Tools,
    Seeds,
    Grounds,
    Voluntaries,
    Users,
    GroundsDonate,
    VoluntariesRequest,
    VoluntariesUsingTools,
    VoluntariesUsingSeeds,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(url) = cli.url {
        config.api_base_url = url;
    }
    let _log_guard = garden_client::logging::init(&config)?;
    let api = garden_client::connect(&config)?;

    match cli.command {
        Commands::Login { username, password } => {
            let (default_user, default_password) = config.credentials().unwrap_or_default();
            let credentials = Credentials::new(
                username.unwrap_or(default_user),
                password.unwrap_or(default_password),
            );
            api.auth().login(&credentials).await?;
            println!("Logged in as {}", credentials.username);
        }
        Commands::Logout => {
            api.auth().logout()?;
            println!("Logged out (tokens removed).");
        }
        Commands::Whoami => match api.session().bootstrap().await? {
            Some(user) => {
                println!("{} <{}> ({})", user.name, user.email, user.id);
                let expires = api
                    .session()
                    .session()
                    .and_then(|session| session.claims().ok())
                    .and_then(|claims| claims.expires_at());
                if let Some(expires) = expires {
                    println!("Access token expires at {expires}");
                }
            }
            None => println!("Not logged in."),
        },
        Commands::List {
            resource,
            search,
            page,
            page_size,
        } => {
            require_session(&api).await?;
            let mut query = IndexQuery::new().page(page, page_size);
            if let Some(search) = search {
                query = query.search(search);
            }
            let listing = list(&api, resource, &query).await?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Commands::Board { ground_id } => {
            require_session(&api).await?;
            let subscription = Subscription::new();
            let watcher = subscription.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    watcher.cancel();
                }
            });
            match subscription.watch(TerrainBoard::load(&api, &ground_id)).await {
                Some(board) => print_board(&board?),
                None => info!(%ground_id, "board closed before it loaded"),
            }
        }
        Commands::Assign {
            ground_id,
            bed_label,
            volunteers,
            responsible,
            start,
        } => {
            require_session(&api).await?;
            let board = TerrainBoard::load(&api, &ground_id).await?;
            if board.bed(&bed_label).is_none() {
                return Err(format!("ground {ground_id} has no bed {bed_label}").into());
            }

            let mut form = AssignmentForm::new();
            for people_id in volunteers {
                form.add(VolunteerEntry {
                    name: people_id.clone(),
                    people_id,
                    start_at: start,
                });
            }
            if let Some(responsible) = responsible {
                if !form.select(&responsible) {
                    return Err(format!("{responsible} is not among the volunteers").into());
                }
            }

            let stores = form.to_stores(&board.ground.id, &bed_label);
            let outcome = match board.assign_volunteers(&api, stores).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    report_failure(&err);
                    return Err("assignment not saved".into());
                }
            };
            for voluntary in &outcome.stored {
                println!("assigned {} to {}", voluntary.people_name, voluntary.bed_label);
            }
            for (index, error) in &outcome.failed {
                println!("item {index} failed: {error}");
            }
        }
    }

    Ok(())
}

/// Restored tokens are probed once; a rejected session means logging in again.
async fn require_session(api: &Api) -> Result<(), Box<dyn std::error::Error>> {
    match api.session().bootstrap().await? {
        Some(user) => {
            info!(user = %user.email, "session restored");
            Ok(())
        }
        None => Err("not logged in, run `garden login` first".into()),
    }
}

/// Prints a failed mutation the way the error is meant to be seen.
fn report_failure(err: &GuardError) {
    let mut notifications = Notifications::default();
    match notifications.report_guarded(err) {
        Disposition::Inline(errors) => {
            for (field, message) in errors.iter() {
                eprintln!("{field}: {message}");
            }
        }
        Disposition::Notified(_) => {
            for notification in notifications.active() {
                eprintln!("{}", notification.message);
            }
        }
        Disposition::HandledBySession => eprintln!("session expired, run `garden login` again"),
        Disposition::Ignored => eprintln!("{err}"),
    }
}

async fn list(api: &Api, resource: ResourceName, query: &IndexQuery) -> ApiResult<Value> {
    let value = match resource {
        ResourceName::Peoples => serde_json::to_value(api.peoples().index(query).await?)?,
        ResourceName::Tools => serde_json::to_value(api.tools().index(query).await?)?,
        ResourceName::Seeds => serde_json::to_value(api.seeds().index(query).await?)?,
        ResourceName::Grounds => serde_json::to_value(api.grounds().index(query).await?)?,
        ResourceName::Voluntaries => serde_json::to_value(api.voluntaries().index(query).await?)?,
        ResourceName::Users => serde_json::to_value(api.users().index(query).await?)?,
        ResourceName::GroundsDonate => {
            serde_json::to_value(api.grounds_donate().index(query).await?)?
        }
        ResourceName::VoluntariesRequest => {
            serde_json::to_value(api.voluntaries_request().index(query).await?)?
        }
        ResourceName::VoluntariesUsingTools => {
            serde_json::to_value(api.voluntaries_using_tools().index(query).await?)?
        }
        ResourceName::VoluntariesUsingSeeds => {
            serde_json::to_value(api.voluntaries_using_seeds().index(query).await?)?
        }
    };
    Ok(value)
}

fn print_board(board: &TerrainBoard) {
    println!("{} ({})", board.ground.description, board.ground.address);
    for row in board.rows() {
        let cards: Vec<String> = row
            .iter()
            .map(|state| {
                let card = state.card();
                let plant = card.plant.map(|p| format!(" | {p}")).unwrap_or_default();
                format!("[{} {}] {} | {}{}", card.label, card.status, card.user, card.period, plant)
            })
            .collect();
        println!("  {}", cards.join("   "));
    }
    let legend: Vec<String> = BedStatus::LEGEND
        .iter()
        .map(|status| format!("{status} = {}", status.legend_label()))
        .collect();
    println!("{}", legend.join(", "));
}
