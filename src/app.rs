use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{
    ActorCommand, CliArgs, Command, ConfigCommand, CustomerCommand, CustomerFields, FilmCommand,
};
use crate::cli::validation;
use crate::client::{CatalogBackend, ClientError, DEFAULT_BASE_URL};
use crate::config::{self, ConfigFile};
use crate::engine::CustomerMatcher;
use crate::forms::CustomerForm;
use crate::model::{Customer, CustomerId};
use crate::output::{self, format_kv_line, OutputFormat};
use crate::session::{Options, Session};
use crate::state::{ListState, RequestSeq};

#[derive(Debug, Clone)]
struct RunConfig {
    options: Options,
    output_format: OutputFormat,
    no_color: bool,
    verbose: u8,
    command: Command,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let base_url = args
        .base_url
        .or(cfg.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let timeout_seconds = args.timeout.or(cfg.timeout).unwrap_or(10);
    let proxy = args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty());
    let page_size = args.page_size.or(cfg.page_size).unwrap_or(10);
    let staff_id = cfg.staff_id.unwrap_or(1);

    let output_format_raw = args
        .output_format
        .or(cfg.output_format)
        .unwrap_or_else(|| "text".to_string());
    let output_format = OutputFormat::parse(&output_format_raw).ok_or_else(|| {
        format!("invalid output format '{output_format_raw}', expected text or json")
    })?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);

    Ok(RunConfig {
        options: Options {
            base_url,
            timeout_seconds,
            proxy,
            page_size,
            staff_id,
        },
        output_format,
        no_color,
        verbose: args.verbose,
        command: args.command,
    })
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

fn print_header(run: &RunConfig) {
    let lines = [
        format_kv_line("Backend", &run.options.base_url),
        format_kv_line("Timeout", &format!("{}s", run.options.timeout_seconds)),
        format_kv_line(
            "Proxy",
            run.options.proxy.as_deref().unwrap_or("none"),
        ),
        format_kv_line("Page size", &run.options.page_size.to_string()),
    ];
    eprintln!("{}", lines.join("\n").dimmed());
    eprintln!();
}

fn spinner(message: &str) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} :: [{elapsed}]")
            .map_err(|e| format!("failed to build spinner style: {e}"))?,
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

async fn with_spinner<T>(message: &str, fut: impl Future<Output = T>) -> Result<T, String> {
    let pb = spinner(message)?;
    let out = fut.await;
    pb.finish_and_clear();
    Ok(out)
}

fn emit(bytes: &[u8]) -> Result<(), String> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|_| stdout.flush())
        .map_err(|e| format!("failed to write output: {e}"))
}

fn load_form(fields: &CustomerFields) -> Result<Option<CustomerForm>, String> {
    match fields.from_file.as_deref() {
        Some(path) => CustomerForm::from_file(&config::expand_tilde(path))
            .map(Some)
            .map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

fn form_from_flags(fields: &CustomerFields) -> CustomerForm {
    CustomerForm::default().apply(fields.to_patch())
}

/// Asks a yes/no question on stderr; anything but `y`/`yes` is a no.
async fn confirm<R>(reader: &mut R, prompt: &str) -> Result<bool, String>
where
    R: AsyncBufRead + Unpin,
{
    eprint!("{prompt} [y/N] ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    reader
        .read_line(&mut answer)
        .await
        .map_err(|e| format!("failed to read answer: {e}"))?;
    Ok(matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes"
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BrowseCommand {
    Next,
    Previous,
    Goto(usize),
    Search(String),
    Refresh,
    Quit,
    Help,
}

fn parse_browse_command(line: &str) -> BrowseCommand {
    let line = line.trim();
    if let Some(query) = line.strip_prefix('/') {
        return BrowseCommand::Search(query.trim().to_string());
    }
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("n") | Some("next"), None) => BrowseCommand::Next,
        (Some("p") | Some("prev"), None) => BrowseCommand::Previous,
        (Some("g") | Some("goto"), Some(n)) => match n.parse::<usize>() {
            Ok(page) => BrowseCommand::Goto(page),
            Err(_) => BrowseCommand::Help,
        },
        (Some("r") | Some("refresh"), None) => BrowseCommand::Refresh,
        (Some("q") | Some("quit"), None) => BrowseCommand::Quit,
        _ => BrowseCommand::Help,
    }
}

const BROWSE_HELP: &str = "[n]ext  [p]rev  [g N] page  [/text] search  [r]efresh  [q]uit";

type FetchResult = (RequestSeq, Result<Vec<Customer>, ClientError>);

fn spawn_fetch<B>(session: &Session<B>, seq: RequestSeq, tx: mpsc::Sender<FetchResult>)
where
    B: CatalogBackend + 'static,
{
    let backend = session.backend();
    tokio::spawn(async move {
        let result = backend.list_customers().await;
        let _ = tx.send((seq, result)).await;
    });
}

fn render_browse<B, W>(
    session: &Session<B>,
    state: &ListState<Customer>,
    out: &mut W,
) -> Result<(), String>
where
    B: CatalogBackend + ?Sized,
    W: Write,
{
    let mut text = String::new();
    if !state.query().is_empty() {
        text.push_str(&format_kv_line("Search", state.query()));
        text.push('\n');
    }
    if state.is_loading() {
        text.push_str(&format!("{}\n", "Loading customers...".dimmed()));
    }
    if let Some(err) = state.error() {
        text.push_str(&format!("{} {}\n", err.red(), "(r to retry)".dimmed()));
    }
    if !state.is_loading() || !state.items().is_empty() {
        let page = state.view(session.page_size(), &CustomerMatcher);
        let rendered = output::render_customer_page(&page, OutputFormat::Text);
        text.push_str(&String::from_utf8_lossy(&rendered));
    }
    text.push_str(&format!("{}\n", BROWSE_HELP.dimmed()));
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| format!("failed to write output: {e}"))
}

/// Interactive customer pager. Fetches run in the background and only the response to the
/// latest request is applied, so the pager stays responsive while loading.
async fn browse<B, R, W>(
    session: &Session<B>,
    query: Option<String>,
    input: R,
    out: &mut W,
) -> Result<(), String>
where
    B: CatalogBackend + 'static,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (tx, mut rx) = mpsc::channel::<FetchResult>(8);
    let mut lines = input.lines();
    let mut input_open = true;

    let (mut state, seq) = ListState::new()
        .set_query(query.unwrap_or_default())
        .issue_request();
    spawn_fetch(session, seq, tx.clone());
    render_browse(session, &state, out)?;

    loop {
        tokio::select! {
            biased;
            Some((seq, result)) = rx.recv() => {
                let current = state.is_current(seq);
                state = state.resolve(seq, result);
                if current {
                    render_browse(session, &state, out)?;
                }
                if !input_open && !state.is_loading() {
                    break;
                }
            }
            line = lines.next_line(), if input_open => {
                let line = line.map_err(|e| format!("failed to read input: {e}"))?;
                let Some(line) = line else {
                    input_open = false;
                    if state.is_loading() {
                        continue;
                    }
                    break;
                };
                let page_size = session.page_size();
                state = match parse_browse_command(&line) {
                    BrowseCommand::Quit => break,
                    BrowseCommand::Next => state.next_page(page_size, &CustomerMatcher),
                    BrowseCommand::Previous => state.previous_page(page_size, &CustomerMatcher),
                    BrowseCommand::Goto(page) => state.set_page(page),
                    BrowseCommand::Search(query) => state.set_query(query),
                    BrowseCommand::Refresh => {
                        let (next, seq) = state.issue_request();
                        spawn_fetch(session, seq, tx.clone());
                        next
                    }
                    BrowseCommand::Help => state,
                };
                render_browse(session, &state, out)?;
            }
        }
    }
    Ok(())
}

async fn run_customers(
    session: &Session,
    command: CustomerCommand,
    format: OutputFormat,
) -> Result<(), String> {
    match command {
        CustomerCommand::List(list) => {
            let query = list.query.unwrap_or_default();
            let page = with_spinner(
                "Fetching customers",
                session.customer_page(&query, list.page),
            )
            .await?
            .map_err(|e| e.to_string())?;
            emit(&output::render_customer_page(&page, format))
        }
        CustomerCommand::Show { id } => {
            let customer = with_spinner("Fetching customer", session.customer(id))
                .await?
                .map_err(|e| e.to_string())?;
            emit(&output::render_customer(&customer, format))
        }
        CustomerCommand::Add(fields) => {
            let form = match load_form(&fields)? {
                Some(form) => form,
                None => form_from_flags(&fields),
            };
            let created = session
                .add_customer(form)
                .await
                .map_err(|e| e.to_string())?;
            refreshed_customer(session, created, format).await
        }
        CustomerCommand::Edit { id, fields } => {
            let updated = match load_form(&fields)? {
                Some(form) => session.replace_customer(id, form).await,
                None => session.edit_customer(id, fields.to_patch()).await,
            }
            .map_err(|e| e.to_string())?;
            refreshed_customer(session, updated, format).await
        }
        CustomerCommand::Delete { id, yes } => {
            if !yes {
                let mut stdin = BufReader::new(tokio::io::stdin());
                let prompt = format!("Do you really want to delete Customer ID {id}?");
                if !confirm(&mut stdin, &prompt).await? {
                    eprintln!("{}", "Aborted".yellow());
                    return Ok(());
                }
            }
            session
                .delete_customer(id)
                .await
                .map_err(|e| e.to_string())?;
            match format {
                OutputFormat::Json => emit(
                    format!("{}\n", serde_json::json!({ "deleted": id })).as_bytes(),
                ),
                OutputFormat::Text => {
                    emit(format!("{} customer {id}\n", "Deleted".green()).as_bytes())?;
                    let page = session
                        .customer_page("", 1)
                        .await
                        .map_err(|e| e.to_string())?;
                    emit(&output::render_customer_page(&page, format))
                }
            }
        }
        CustomerCommand::Return {
            customer_id,
            rental_id,
        } => {
            let outcome = session
                .return_rental(customer_id, &rental_id)
                .await
                .map_err(|e| e.to_string())?;
            emit(&output::render_return(&outcome, format))?;
            if format == OutputFormat::Text {
                let customer = session
                    .customer(customer_id)
                    .await
                    .map_err(|e| e.to_string())?;
                emit(&output::render_customer(&customer, format))?;
            }
            Ok(())
        }
        CustomerCommand::Browse { query } => {
            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            browse(session, query, stdin, &mut stdout).await
        }
    }
}

/// Shows a customer as the backend now has it, falling back to the mutation's response.
async fn refreshed_customer(
    session: &Session,
    fallback: Customer,
    format: OutputFormat,
) -> Result<(), String> {
    let id: CustomerId = fallback.customer_id;
    let customer = match session.customer(id).await {
        Ok(customer) => customer,
        Err(e) => {
            tracing::warn!(customer_id = id, error = %e, "refresh after save failed");
            fallback
        }
    };
    emit(&output::render_customer(&customer, format))
}

async fn run_films(
    session: &Session,
    command: FilmCommand,
    format: OutputFormat,
) -> Result<(), String> {
    match command {
        FilmCommand::List(list) => {
            let query = list.query.unwrap_or_default();
            let page = with_spinner("Fetching films", session.film_page(&query, list.page))
                .await?
                .map_err(|e| e.to_string())?;
            emit(&output::render_film_page(&page, format))
        }
        FilmCommand::Show { film_id } => {
            let film = with_spinner("Fetching film", session.film(film_id))
                .await?
                .map_err(|e| e.to_string())?;
            emit(&output::render_film(&film, format))
        }
        FilmCommand::Top => {
            let films = with_spinner("Fetching top films", session.top_films())
                .await?
                .map_err(|e| e.to_string())?;
            emit(&output::render_films(&films, format))
        }
        FilmCommand::Availability { film_id } => {
            let availability = session
                .availability(film_id)
                .await
                .map_err(|e| e.to_string())?;
            emit(&output::render_availability(film_id, &availability, format))
        }
        FilmCommand::Rent {
            film_id,
            customer_id,
            staff_id,
        } => {
            let rental = session
                .rent_film(film_id, customer_id, staff_id)
                .await
                .map_err(|e| e.to_string())?;
            emit(&output::render_rental(&rental, format))?;
            if format == OutputFormat::Text {
                let availability = session
                    .availability(film_id)
                    .await
                    .map_err(|e| e.to_string())?;
                emit(&output::render_availability(film_id, &availability, format))?;
            }
            Ok(())
        }
    }
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    if run.output_format == OutputFormat::Text {
        print_header(&run);
    }
    let format = run.output_format;
    let session = Session::new(run.options).map_err(|e| e.to_string())?;

    match run.command {
        Command::Customers(command) => run_customers(&session, command, format).await,
        Command::Films(command) => run_films(&session, command, format).await,
        Command::Actors(ActorCommand::Top) => {
            let actors = with_spinner("Fetching top actors", session.top_actors())
                .await?
                .map_err(|e| e.to_string())?;
            emit(&output::render_actors(&actors, format))
        }
        Command::Overview => {
            let overview = with_spinner("Fetching overview", session.overview())
                .await?
                .map_err(|e| e.to_string())?;
            emit(&output::render_overview(&overview, format))
        }
        Command::Config(_) => Ok(()),
    }
}

fn init_config(path: Option<String>) -> Result<(), String> {
    let path = match path {
        Some(p) => config::expand_tilde(&p),
        None => config::default_config_path()
            .ok_or_else(|| "cannot determine home directory for config".to_string())?,
    };
    if config::ensure_default_config_file(&path)? {
        println!("{}", format_kv_line("Created", &path.display().to_string()));
    } else {
        println!("{}", format_kv_line("Exists", &path.display().to_string()));
    }
    Ok(())
}

fn config_path(args: &CliArgs) -> Option<(PathBuf, bool)> {
    match args.config.as_deref() {
        Some(p) => Some((config::expand_tilde(p), false)),
        None => config::default_config_path().map(|p| (p, true)),
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                let _ = e.print();
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_tracing(args.verbose);

    if let Command::Config(ConfigCommand::Init { path }) = &args.command {
        return init_config(path.clone());
    }

    let cfg = match config_path(&args) {
        Some((path, allow_missing)) => config::load_config(&path, allow_missing)?,
        None => ConfigFile::default(),
    };

    let run = build_run_config(args, cfg)?;
    tracing::debug!(verbose = run.verbose, base_url = %run.options.base_url, "starting");

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
