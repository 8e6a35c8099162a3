#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal front end for the mangrove field survey.
//!
//! ```text
//! mangrove_map login [--email you@example.com]
//! mangrove_map map [--drill 2] [--once]
//! mangrove_map records [--category pollution] [--once]
//! mangrove_map delete <category> <id>
//! mangrove_map show <category> <id>
//! mangrove_map summary [--watch]
//! mangrove_map sync
//! mangrove_map add-point --name "Plot A" --lat -5.83 --lon 110.45
//! mangrove_map observe --name "Plot A" --species "Rhizophora apiculata" \
//!     --dbh 12 --height 6 --density 15 --health Sehat --substrate Lumpur \
//!     --lat -5.83 --lon 110.45 [--photo plot.jpg] [--edit <id>]
//! mangrove_map report-pollution --type Minyak --severity Tinggi \
//!     --description "Oil sheen" --lat -5.83 --lon 110.45
//! mangrove_map report-disturbance --type Penebangan --scale Sedang \
//!     --area "0.5 ha" --description "Fresh stumps" --lat -5.83 --lon 110.45
//! mangrove_map sighting --kind Burung --species Kuntul --population 4 \
//!     --rarity Umum --photo bird.jpg --lat -5.83 --lon 110.45
//! mangrove_map edit-location <id> --name "Plot A" --lat -5.84 --lon 110.46
//! mangrove_map guide [--query bakau] [--category "True Mangrove"] [--desc]
//! mangrove_map upload photo.jpg [--category observations]
//! ```
//!
//! Saved sessions are refreshed on start so restored tokens stay valid.
//!
//! Running with no subcommand shows an interactive menu.
//!
//! The hosted services are configured with `--config <file.toml>` or the
//! `FIREBASE_*` environment variables. Log output goes through
//! [`mangrove_cli_utils::init_logger`] so it never fights the spinners.

mod live;

use std::path::PathBuf;
use std::str::FromStr as _;

use clap::{Args, Parser, Subcommand};
use dialoguer::Select;
use mangrove_cli_utils::MultiProgress;
use mangrove_record::{
    GpsFix, NewDisturbance, NewObservation, NewPlanningPoint, NewPollution, NewSighting,
    PayloadError, RecordEntry, RecordForm, Summary, delete_record, fetch_record, save_record,
    stored_photo_url, submit_planning_point, update_location, upload_photo,
};
use mangrove_record_models::Category;
use mangrove_store::firebase::FirebaseClient;
use mangrove_store::{AuthProvider as _, FirebaseConfig, session};

#[derive(Parser)]
#[command(name = "mangrove_map", about = "Mangrove field survey records and map")]
struct Cli {
    /// Path to a TOML file with the hosted service settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and save the session
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and save the session
    Signup {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Stream every record collection onto the clustered map
    Map {
        /// Drill into the first cluster this many times once loaded
        #[arg(long, default_value = "0")]
        drill: usize,
        /// Exit after the first complete render
        #[arg(long)]
        once: bool,
    },
    /// Stream the per-category record lists
    Records {
        /// Only show one category (e.g. `pollution`, `other_forms`)
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,
        /// Exit after the first complete listing
        #[arg(long)]
        once: bool,
    },
    /// Delete one record
    Delete {
        /// Category name (e.g. `observations`, `planning_plots`)
        #[arg(value_parser = parse_category)]
        category: Category,
        /// Record ID
        id: String,
    },
    /// Print one record's details
    Show {
        #[arg(value_parser = parse_category)]
        category: Category,
        /// Record ID
        id: String,
    },
    /// Show home-screen record counts
    Summary {
        /// Keep the counts live until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Mark every observation as synced
    Sync,
    /// Save a planning point
    AddPoint {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        fix: FixArgs,
    },
    /// Record a mangrove plot observation
    Observe {
        /// Plot name
        #[arg(long)]
        name: String,
        #[arg(long)]
        species: String,
        /// Trunk diameter at breast height (cm)
        #[arg(long)]
        dbh: String,
        /// Tree height (m)
        #[arg(long)]
        height: String,
        /// Trees per plot
        #[arg(long)]
        density: String,
        /// Health status (e.g. `Sehat`)
        #[arg(long)]
        health: String,
        /// Substrate (e.g. `Lumpur`)
        #[arg(long)]
        substrate: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[command(flatten)]
        fix: FixArgs,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Report pollution
    ReportPollution {
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        severity: String,
        #[arg(long)]
        description: String,
        /// How far it spreads
        #[arg(long, default_value = "")]
        spread: String,
        #[command(flatten)]
        fix: FixArgs,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Report a habitat disturbance
    ReportDisturbance {
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        scale: String,
        /// Affected area estimate
        #[arg(long)]
        area: String,
        #[arg(long)]
        description: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[command(flatten)]
        fix: FixArgs,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Record a wildlife or other sighting (a photo is required)
    Sighting {
        /// What was sighted (e.g. `Burung`)
        #[arg(long)]
        kind: String,
        /// Species or find name
        #[arg(long)]
        species: String,
        /// Count or estimate
        #[arg(long)]
        population: String,
        #[arg(long, default_value = "")]
        behavior: String,
        #[arg(long)]
        rarity: String,
        #[arg(long, default_value = "")]
        notes: String,
        #[command(flatten)]
        fix: FixArgs,
        #[command(flatten)]
        save: SaveArgs,
    },
    /// Rename an observation and move it to a new position
    EditLocation {
        /// Observation ID
        id: String,
        #[arg(long)]
        name: String,
        #[command(flatten)]
        fix: FixArgs,
    },
    /// Browse the species guide
    Guide {
        /// Substring of the scientific or local name
        #[arg(long, default_value = "")]
        query: String,
        /// Exact habitat category
        #[arg(long)]
        category: Option<String>,
        /// Sort Z to A
        #[arg(long)]
        desc: bool,
    },
    /// Upload a photo and print its URL
    Upload {
        /// JPEG file to upload
        file: PathBuf,
        /// Category whose photo folder receives the file
        #[arg(long, default_value = "pollution", value_parser = parse_category)]
        category: Category,
    },
}

/// A GPS reading entered on the command line.
#[derive(Args)]
struct FixArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,
    /// GPS accuracy in metres
    #[arg(long)]
    accuracy: Option<f64>,
}

impl FixArgs {
    const fn fix(&self) -> GpsFix {
        GpsFix {
            latitude: self.lat,
            longitude: self.lon,
            accuracy: self.accuracy,
        }
    }
}

/// Options shared by the survey forms.
#[derive(Args)]
struct SaveArgs {
    /// Update this existing record instead of creating one
    #[arg(long)]
    edit: Option<String>,
    /// JPEG photo to upload with the record
    #[arg(long)]
    photo: Option<PathBuf>,
}

fn parse_category(name: &str) -> Result<Category, String> {
    Category::from_str(name).map_err(|_| {
        let names: Vec<&str> = Category::all().iter().map(|c| c.as_ref()).collect();
        format!("unknown category `{name}`, expected one of: {}", names.join(", "))
    })
}

/// Entries offered by the interactive menu.
enum MenuItem {
    Map,
    Records,
    Summary,
    Sync,
    Guide,
    Login,
    Logout,
}

impl MenuItem {
    const ALL: &[Self] = &[
        Self::Map,
        Self::Records,
        Self::Summary,
        Self::Sync,
        Self::Guide,
        Self::Login,
        Self::Logout,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Map => "View map",
            Self::Records => "View my records",
            Self::Summary => "Show summary",
            Self::Sync => "Sync observations",
            Self::Guide => "Species guide",
            Self::Login => "Log in",
            Self::Logout => "Log out",
        }
    }

    fn command(&self) -> Commands {
        match self {
            Self::Map => Commands::Map {
                drill: 0,
                once: false,
            },
            Self::Records => Commands::Records {
                category: None,
                once: true,
            },
            Self::Summary => Commands::Summary { watch: false },
            Self::Sync => Commands::Sync,
            Self::Guide => Commands::Guide {
                query: String::new(),
                category: None,
                desc: false,
            },
            Self::Login => Commands::Login { email: None },
            Self::Logout => Commands::Logout,
        }
    }
}

fn select_command() -> Result<Commands, dialoguer::Error> {
    println!("Mangrove Map");
    println!();

    let labels: Vec<&str> = MenuItem::ALL.iter().map(MenuItem::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(MenuItem::ALL[idx].command())
}

/// Where the client settings and saved session live.
struct Context {
    config: Option<PathBuf>,
    session_path: PathBuf,
}

impl Context {
    /// Builds the client from config plus any saved session.
    fn client(&self) -> Result<FirebaseClient, Box<dyn std::error::Error>> {
        let config = FirebaseConfig::load(self.config.as_deref())?;
        let user = session::load(&self.session_path)?;
        if let Some(user) = &user {
            log::debug!("Restored session for {}", user.email);
        }
        Ok(FirebaseClient::new(config).with_user(user))
    }

    /// Like [`Self::client`], but trades a restored session's refresh token
    /// for a fresh ID token and saves it. A failed refresh keeps the saved
    /// session.
    async fn connect(&self) -> Result<FirebaseClient, Box<dyn std::error::Error>> {
        let client = self.client()?;
        if client.current_user().is_none() {
            return Ok(client);
        }

        match client.refresh_session().await {
            Ok(Some(user)) => session::save(&self.session_path, &user)?,
            Ok(None) => log::debug!("Saved session has no refresh token"),
            Err(e) => log::warn!("Could not refresh saved session: {e}"),
        }
        Ok(client)
    }
}

/// Uploads `--photo` if given. When editing without one, returns the
/// record's stored photo so it is kept.
async fn form_photo(
    client: &FirebaseClient,
    category: Category,
    save: &SaveArgs,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    if let Some(file) = &save.photo {
        let bytes = tokio::fs::read(file).await?;
        log::info!("Uploading {} ({} bytes)", file.display(), bytes.len());
        return Ok(Some(upload_photo(client, category, bytes).await?));
    }
    match &save.edit {
        Some(id) => Ok(stored_photo_url(client, category, id).await?),
        None => Ok(None),
    }
}

async fn save_form(
    client: &FirebaseClient,
    save: &SaveArgs,
    form: &dyn RecordForm,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = save_record(client, save.edit.as_deref(), form).await?;
    let verb = if save.edit.is_some() { "Updated" } else { "Saved" };
    println!("{verb} {} {id}", form.category().title());
    Ok(())
}

fn print_guide(query: &str, category: Option<&str>, ascending: bool) {
    let species = mangrove_guide::all_species();
    let matches = mangrove_guide::search(&species, query, category, ascending);

    if matches.is_empty() {
        println!("No species found.");
        let categories = mangrove_guide::categories(&species);
        println!("Categories: {}", categories.join(", "));
        return;
    }

    for s in matches {
        println!("{} ({}) [{}]", s.scientific_name, s.local_name, s.category);
        for (label, value) in s.detail.rows() {
            println!("  {label}: {value}");
        }
        println!();
    }
}

#[allow(clippy::too_many_lines)]
async fn run(
    command: Commands,
    context: &Context,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Guide {
            query,
            category,
            desc,
        } => print_guide(&query, category.as_deref(), !desc),
        Commands::Login { email } => {
            let (email, password) = mangrove_cli_utils::prompt_credentials(email, false)?;
            let user = context.client()?.sign_in(&email, &password).await?;
            session::save(&context.session_path, &user)?;
            println!("Signed in as {}", user.email);
        }
        Commands::Signup { email } => {
            let (email, password) = mangrove_cli_utils::prompt_credentials(email, true)?;
            let user = context.client()?.sign_up(&email, &password).await?;
            session::save(&context.session_path, &user)?;
            println!("Account created for {}", user.email);
        }
        Commands::Logout => {
            context.client()?.sign_out().await?;
            session::clear(&context.session_path)?;
            println!("Signed out.");
        }
        Commands::Whoami => match context.connect().await?.current_user() {
            Some(user) => println!("{} ({})", user.email, user.uid),
            None => println!("Not signed in."),
        },
        Commands::Map { drill, once } => {
            live::map(multi, &context.connect().await?, drill, once).await;
        }
        Commands::Records { category, once } => {
            live::records(multi, &context.connect().await?, category, once).await;
        }
        Commands::Delete { category, id } => {
            delete_record(&context.connect().await?, category, &id).await?;
            println!("Deleted {} {id}", category.title());
        }
        Commands::Show { category, id } => {
            let record = fetch_record(&context.connect().await?, category, &id).await?;
            let entry = record
                .and_then(|value| RecordEntry::from_value(category, &id, &value))
                .ok_or(PayloadError::NotFound { category, id })?;
            live::render_entry(&entry);
        }
        Commands::Summary { watch: true } => {
            live::summary(multi, &context.connect().await?).await;
        }
        Commands::Summary { watch: false } => {
            live::render_summary(&Summary::load(&context.connect().await?).await?);
        }
        Commands::Sync => {
            let report = mangrove_record::sync_observations(&context.connect().await?).await?;
            for (id, e) in &report.failed {
                log::warn!("Failed to sync observation {id}: {e}");
            }
            println!(
                "Synced {} observations ({} failed)",
                report.updated,
                report.failed.len()
            );
        }
        Commands::AddPoint { name, fix } => {
            let point = NewPlanningPoint {
                name,
                fix: fix.fix(),
            };
            let id = submit_planning_point(&context.connect().await?, &point).await?;
            println!("Saved planning point {id}");
        }
        Commands::Observe {
            name,
            species,
            dbh,
            height,
            density,
            health,
            substrate,
            notes,
            fix,
            save,
        } => {
            let client = context.connect().await?;
            let form = NewObservation {
                name,
                species,
                dbh,
                height,
                density,
                health_status: health,
                substrate,
                notes,
                photo_url: form_photo(&client, Category::Observations, &save).await?,
                fix: fix.fix(),
            };
            save_form(&client, &save, &form).await?;
        }
        Commands::ReportPollution {
            kind,
            severity,
            description,
            spread,
            fix,
            save,
        } => {
            let client = context.connect().await?;
            let form = NewPollution {
                pollution_type: kind,
                severity,
                description,
                spread,
                photo_url: form_photo(&client, Category::Pollution, &save).await?,
                fix: fix.fix(),
            };
            save_form(&client, &save, &form).await?;
        }
        Commands::ReportDisturbance {
            kind,
            scale,
            area,
            description,
            notes,
            fix,
            save,
        } => {
            let client = context.connect().await?;
            let form = NewDisturbance {
                disturbance_type: kind,
                scale,
                area,
                description,
                notes,
                photo_url: form_photo(&client, Category::Disturbance, &save).await?,
                fix: fix.fix(),
            };
            save_form(&client, &save, &form).await?;
        }
        Commands::Sighting {
            kind,
            species,
            population,
            behavior,
            rarity,
            notes,
            fix,
            save,
        } => {
            let client = context.connect().await?;
            let form = NewSighting {
                kind,
                species_name: species,
                population,
                behavior,
                rarity,
                notes,
                photo_url: form_photo(&client, Category::Sightings, &save).await?,
                fix: fix.fix(),
            };
            save_form(&client, &save, &form).await?;
        }
        Commands::EditLocation { id, name, fix } => {
            update_location(&context.connect().await?, &id, &name, &fix.fix()).await?;
            println!("Moved observation {id}");
        }
        Commands::Upload { file, category } => {
            let bytes = tokio::fs::read(&file).await?;
            log::info!("Uploading {} ({} bytes)", file.display(), bytes.len());
            let url = upload_photo(&context.connect().await?, category, bytes).await?;
            println!("{url}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = mangrove_cli_utils::init_logger();
    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => select_command()?,
    };

    let context = Context {
        config: cli.config,
        session_path: session::session_path(),
    };
    run(command, &context, &multi).await
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn form_subcommands_share_fix_and_save_args() {
        let cli = Cli::try_parse_from([
            "mangrove_map",
            "report-pollution",
            "--type",
            "Minyak",
            "--severity",
            "Tinggi",
            "--description",
            "Oil sheen",
            "--lat",
            "-5.83",
            "--lon",
            "110.45",
            "--edit",
            "Nabc",
        ])
        .unwrap();
        let Some(Commands::ReportPollution { kind, fix, save, .. }) = cli.command else {
            panic!("expected report-pollution");
        };
        assert_eq!(kind, "Minyak");
        assert!((fix.fix().latitude + 5.83).abs() < f64::EPSILON);
        assert_eq!(save.edit.as_deref(), Some("Nabc"));
        assert!(save.photo.is_none());
    }

    #[tokio::test]
    async fn guide_runs_without_store_settings() {
        let context = Context {
            config: Some(PathBuf::from("/nonexistent/mangrove.toml")),
            session_path: PathBuf::from("/nonexistent/session.json"),
        };
        assert!(context.client().is_err());

        let command = Commands::Guide {
            query: "rhizophora".to_string(),
            category: None,
            desc: false,
        };
        let multi = MultiProgress::new();
        run(command, &context, &multi).await.unwrap();
    }
}
