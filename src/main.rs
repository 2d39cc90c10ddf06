use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::Level;

use podhub::api;
use podhub::config::{API_URL_ENV, DEFAULT_API_URL, TOKEN_FILE_ENV};
use podhub::{
    AudioFile, ClientConfig, ClientEvent, Episode, EventReporter, FileTokenStore, NewEpisode,
    NewPodcast, NoopReporter, Podcast, ReqwestClient, Role, SessionController,
    SharedEventReporter, View, download_audio,
};

// Emoji with fallback for terminals without Unicode support
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");

/// Browse, search, and publish podcasts on PodcastHub
#[derive(Parser, Debug)]
#[command(name = "podhub")]
#[command(about = "Browse, search, and publish podcasts on PodcastHub")]
#[command(version)]
struct Cli {
    /// Base URL of the PodcastHub API
    #[arg(long, env = API_URL_ENV, default_value = DEFAULT_API_URL)]
    api_url: String,

    /// File the session token is persisted in
    #[arg(long, env = TOKEN_FILE_ENV)]
    token_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the API is reachable
    Ping,
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PODHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a new account (does not log in)
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "PODHUB_PASSWORD", hide_env_values = true)]
        password: String,
        /// listener or podcaster
        #[arg(long, default_value = "listener")]
        role: Role,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in account
    Whoami,
    /// Browse and manage podcasts
    Podcasts(PodcastsCommand),
    /// Browse and upload episodes
    Episodes(EpisodesCommand),
    /// Search podcasts and episodes
    Search {
        query: String,
    },
    /// Print the stream URL of an episode's audio
    Listen {
        episode_id: String,
    },
    /// Download an episode's audio
    Download {
        episode_id: String,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct PodcastsCommand {
    #[command(subcommand)]
    command: PodcastsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PodcastsSubcommand {
    /// All podcasts
    List,
    /// Podcasts you own (podcasters only)
    Mine,
    /// One podcast with its episodes
    Show { podcast_id: String },
    /// Create a podcast (podcasters only)
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        category: String,
    },
}

#[derive(Args, Debug)]
struct EpisodesCommand {
    #[command(subcommand)]
    command: EpisodesSubcommand,
}

#[derive(Subcommand, Debug)]
enum EpisodesSubcommand {
    /// All episodes, or those of one podcast
    List {
        #[arg(long)]
        podcast: Option<String>,
    },
    /// One episode
    Show { episode_id: String },
    /// Upload an MP3, WAV, or OGG episode to one of your podcasts
    Upload {
        podcast_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

impl Command {
    /// The screen this command corresponds to
    fn view(&self) -> View {
        match self {
            Command::Ping | Command::Logout => View::Landing,
            Command::Login { .. } => View::Login,
            Command::Register { .. } => View::Register,
            Command::Whoami => View::Dashboard,
            Command::Podcasts(podcasts) => match &podcasts.command {
                PodcastsSubcommand::Show { podcast_id } => View::Podcast(podcast_id.clone()),
                PodcastsSubcommand::Mine | PodcastsSubcommand::Create { .. } => View::Dashboard,
                PodcastsSubcommand::List => View::Browse,
            },
            Command::Episodes(episodes) => match &episodes.command {
                EpisodesSubcommand::Upload { .. } => View::Dashboard,
                _ => View::Browse,
            },
            Command::Search { query } => View::Search(query.clone()),
            Command::Listen { .. } | Command::Download { .. } => View::Browse,
        }
    }
}

/// Console output for session messages and download progress
struct ConsoleReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut bar) = self.bar.lock() {
            f(&mut bar);
        }
    }
}

impl EventReporter for ConsoleReporter {
    fn report(&self, event: ClientEvent) {
        match event {
            ClientEvent::SessionRestored { username } => {
                tracing::debug!(%username, "using stored session");
            }
            ClientEvent::SessionExpired { .. } => {
                eprintln!(
                    "{KEY}{}",
                    "Stored session is no longer valid, please log in again.".yellow()
                );
            }
            ClientEvent::LoggedIn { username } => {
                println!("{SUCCESS}Logged in as {}", username.bold().green());
            }
            // The command's error carries the message to stderr
            ClientEvent::LoginFailed { message } | ClientEvent::RegisterFailed { message } => {
                tracing::debug!(%message, "authentication rejected");
            }
            ClientEvent::Registered { username } => {
                println!(
                    "{SUCCESS}Account {} created. You can log in now.",
                    username.bold().green()
                );
            }
            ClientEvent::LoggedOut => {
                println!("{KEY}Logged out");
            }
            ClientEvent::DownloadStarting {
                episode_title,
                content_length,
            } => {
                let style = ProgressStyle::default_bar()
                    .template(&format!(
                        "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
                    ))
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░");

                let bar = ProgressBar::new(content_length.unwrap_or(0));
                bar.set_style(style);
                bar.set_message(truncate_title(&episode_title, 40));
                self.with_bar(|slot| *slot = Some(bar));
            }
            ClientEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => self.with_bar(|slot| {
                if let Some(bar) = slot {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }),
            ClientEvent::DownloadCompleted {
                episode_title,
                hash,
                ..
            } => {
                self.with_bar(|slot| {
                    if let Some(bar) = slot.take() {
                        bar.finish_and_clear();
                    }
                });
                println!(
                    "{SUCCESS}{} {}",
                    truncate_title(&episode_title, 40).green(),
                    hash.dimmed()
                );
            }
            ClientEvent::DownloadFailed {
                episode_title,
                error,
            } => {
                self.with_bar(|slot| {
                    if let Some(bar) = slot.take() {
                        bar.abandon();
                    }
                });
                eprintln!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn print_podcast(podcast: &Podcast) {
    println!(
        "{HEADPHONES}{} {} {}",
        podcast.title.bold(),
        format!("[{}]", podcast.category).cyan(),
        podcast.id.dimmed()
    );
    if !podcast.description.is_empty() {
        println!("    {}", podcast.description);
    }
}

fn print_episode(episode: &Episode) {
    let date = episode
        .created_at
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    println!(
        "  {} {} {}",
        date.dimmed(),
        episode.title.bold(),
        episode.id.dimmed()
    );
    if !episode.description.is_empty() {
        println!("    {}", episode.description);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config =
        ClientConfig::new(&cli.api_url, cli.token_file.clone()).context("Invalid --api-url")?;
    let client = ReqwestClient::new(config.api_base());

    let reporter: SharedEventReporter = if cli.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(ConsoleReporter::new())
    };

    let mut session =
        SessionController::new(FileTokenStore::new(&config.token_file), reporter.clone());
    session.restore(&client).await;
    session.navigate(cli.command.view());

    run(cli.command, &config, &client, &mut session, &reporter).await
}

async fn run(
    command: Command,
    config: &ClientConfig,
    client: &ReqwestClient,
    session: &mut SessionController<FileTokenStore>,
    reporter: &SharedEventReporter,
) -> Result<()> {
    match command {
        Command::Ping => {
            let message = api::health(client).await.context("API is not reachable")?;
            println!("{SUCCESS}{message}");
        }

        Command::Login { email, password } => {
            if let Err(e) = session.login(client, &email, &password).await {
                bail!(e.message());
            }
        }

        Command::Register {
            email,
            username,
            password,
            role,
        } => {
            if let Err(e) = session
                .register(client, &email, &username, &password, role)
                .await
            {
                bail!(e.message());
            }
        }

        Command::Logout => session.logout(),

        Command::Whoami => match session.current_user() {
            Some(user) => {
                println!(
                    "{KEY}{} ({})",
                    user.username.bold().green(),
                    user.role.to_string().cyan()
                );
                if let Some(email) = &user.email {
                    println!("    {email}");
                }
            }
            None => bail!("Not logged in"),
        },

        Command::Podcasts(podcasts) => run_podcasts(podcasts, client, session).await?,

        Command::Episodes(episodes) => run_episodes(episodes, client, session).await?,

        Command::Search { query } => {
            let results = api::search(client, &query)
                .await
                .context("Search failed")?;
            if results.is_empty() {
                println!("No results for {}", query.yellow());
            }
            for podcast in &results.podcasts {
                print_podcast(podcast);
            }
            for episode in &results.episodes {
                print_episode(episode);
            }
        }

        Command::Listen { episode_id } => {
            let episode = api::get_episode(client, &episode_id)
                .await
                .context("Failed to load episode")?;
            let url = api::audio_url(config.api_base(), &episode.audio_file)?;
            println!("{HEADPHONES}{}", episode.title.bold());
            println!("{url}");
        }

        Command::Download { episode_id, output } => {
            let episode = api::get_episode(client, &episode_id)
                .await
                .context("Failed to load episode")?;
            let result = download_audio(client, config.api_base(), &episode, &output, reporter)
                .await
                .context("Failed to download episode")?;
            println!(
                "\n{FOLDER}Output: {}\n",
                result.path.display().to_string().cyan()
            );
        }
    }

    Ok(())
}

async fn run_podcasts(
    podcasts: PodcastsCommand,
    client: &ReqwestClient,
    session: &SessionController<FileTokenStore>,
) -> Result<()> {
    match podcasts.command {
        PodcastsSubcommand::List => {
            let podcasts = api::list_podcasts(client)
                .await
                .context("Failed to load podcasts")?;
            if podcasts.is_empty() {
                println!("No podcasts yet");
            }
            podcasts.iter().for_each(print_podcast);
        }

        PodcastsSubcommand::Mine => {
            let podcasts = api::my_podcasts(client, session)
                .await
                .context("Failed to load your podcasts")?;
            if podcasts.is_empty() {
                println!("You have not created any podcasts yet");
            }
            podcasts.iter().for_each(print_podcast);
        }

        PodcastsSubcommand::Show { podcast_id } => {
            let podcast = api::get_podcast(client, &podcast_id)
                .await
                .context("Failed to load podcast")?;
            print_podcast(&podcast);
            let episodes = api::list_episodes(client, &podcast_id)
                .await
                .context("Failed to load episodes")?;
            episodes.iter().for_each(print_episode);
        }

        PodcastsSubcommand::Create {
            title,
            description,
            category,
        } => {
            let form = NewPodcast {
                title,
                description,
                category,
            };
            let podcast = api::create_podcast(client, session, &form)
                .await
                .context("Failed to create podcast")?;
            println!("{SUCCESS}Created podcast");
            print_podcast(&podcast);
        }
    }

    Ok(())
}

async fn run_episodes(
    episodes: EpisodesCommand,
    client: &ReqwestClient,
    session: &SessionController<FileTokenStore>,
) -> Result<()> {
    match episodes.command {
        EpisodesSubcommand::List { podcast } => {
            let episodes = match podcast {
                Some(podcast_id) => api::list_episodes(client, &podcast_id).await,
                None => api::all_episodes(client).await,
            }
            .context("Failed to load episodes")?;
            if episodes.is_empty() {
                println!("No episodes yet");
            }
            episodes.iter().for_each(print_episode);
        }

        EpisodesSubcommand::Show { episode_id } => {
            let episode = api::get_episode(client, &episode_id)
                .await
                .context("Failed to load episode")?;
            print_episode(&episode);
        }

        EpisodesSubcommand::Upload {
            podcast_id,
            title,
            description,
            file,
        } => {
            let audio = match file {
                Some(path) => Some(
                    AudioFile::read(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => None,
            };
            let form = NewEpisode {
                title,
                description,
                audio,
            };
            let episode = api::upload_episode(client, session, &podcast_id, &form)
                .await
                .context("Failed to upload episode")?;
            println!("{SUCCESS}Uploaded episode");
            print_episode(&episode);
        }
    }

    Ok(())
}
