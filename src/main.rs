use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use reclink::compare::{Comparator, Levenshtein, distance};
use reclink::config::{ConfigError, EffectiveConfig, default_repo_config_yaml, load_effective_config};
use reclink::link::{AssertionsWin, Link, LinkKind, LinkStatus};
use reclink::store::{ChangeQuery, ConnectionSpec, LinkStore, LinkStoreError, StoreTarget};
use serde_json::{Value, json};

#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn io(code: &'static str, err: io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl From<LinkStoreError> for CliError {
    fn from(value: LinkStoreError) -> Self {
        Self::new("store_error", value.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::new("config_error", value.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::new("json_error", value.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "reclink")]
#[command(about = "Record linkage decisions and string similarity")]
struct Cli {
    /// Database path; overrides the configured `database`.
    #[arg(long, global = true)]
    db: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Init,
    Assert(AssertArgs),
    Links(LinksArgs),
    LinksFor(LinksForArgs),
    Clear,
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct AssertArgs {
    id1: String,
    id2: String,
    #[arg(long, value_parser = parse_kind)]
    kind: LinkKind,
    #[arg(long, value_parser = parse_status, default_value = "asserted")]
    status: LinkStatus,
}

#[derive(Args, Debug)]
struct LinksArgs {
    #[arg(long, value_parser = parse_timestamp)]
    since: Option<DateTime<Utc>>,
    #[arg(long, value_parser = parse_timestamp)]
    before: Option<DateTime<Utc>>,
    #[arg(long, default_value_t = 0)]
    limit: usize,
}

#[derive(Args, Debug)]
struct LinksForArgs {
    id: String,
}

#[derive(Args, Debug)]
struct CompareArgs {
    left: String,
    right: String,
}

struct Context {
    paths: RepoPaths,
    config: EffectiveConfig,
}

#[derive(Debug, Clone)]
struct RepoPaths {
    cwd: PathBuf,
    home: PathBuf,
    repo_config: PathBuf,
    user_config: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let payload = json!({
                "error": {
                    "code": err.code,
                    "message": err.message,
                }
            });
            eprintln!("{payload}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init => cmd_init(&load_context(cli.db)?),
        Command::Assert(args) => cmd_assert(&load_context(cli.db)?, args),
        Command::Links(args) => cmd_links(&load_context(cli.db)?, args),
        Command::LinksFor(args) => cmd_links_for(&load_context(cli.db)?, args),
        Command::Clear => cmd_clear(&load_context(cli.db)?),
        Command::Compare(args) => cmd_compare(&args),
    }
}

fn load_context(db_override: Option<String>) -> Result<Context, CliError> {
    let cwd = std::env::current_dir().map_err(|err| CliError::io("cwd_error", err))?;
    let paths = repo_paths(cwd)?;
    let mut config = load_effective_config(
        &paths.cwd,
        Some(&paths.repo_config),
        Some(&paths.user_config),
    )?;
    if let Some(db) = db_override {
        config.database = db;
    }
    Ok(Context { paths, config })
}

fn cmd_init(ctx: &Context) -> Result<(), CliError> {
    let spec = ctx.spec();
    if let StoreTarget::File(path) = &spec.target
        && let Some(parent) = path.parent()
    {
        fs::create_dir_all(parent).map_err(|err| CliError::io("mkdir_error", err))?;
    }
    let store = LinkStore::open(&spec)?;
    store.close()?;
    write_default_config(&ctx.paths)?;

    print_json(&json!({
        "status": "ok",
        "database": target_json(&spec.target),
        "config": ctx.paths.repo_config,
    }))
}

fn cmd_assert(ctx: &Context, args: AssertArgs) -> Result<(), CliError> {
    let mut store = open_initialized(ctx)?;
    let link = Link::new(args.id1, args.id2, args.kind, args.status);
    let outcome = store.assert_link(&link, &AssertionsWin)?;
    store.commit()?;
    let stored = store.link_for(&link.id1, &link.id2)?;
    store.close()?;

    print_json(&json!({
        "status": "ok",
        "outcome": outcome.as_str(),
        "link": stored.as_ref().map(link_to_json),
    }))
}

fn cmd_links(ctx: &Context, args: LinksArgs) -> Result<(), CliError> {
    let store = open_initialized(ctx)?;
    let links = store.changes(&ChangeQuery {
        since: args.since,
        before: args.before,
        page_size: args.limit,
    })?;
    store.close()?;

    print_json(&json!({
        "status": "ok",
        "count": links.len(),
        "links": links.iter().map(link_to_json).collect::<Vec<_>>(),
    }))
}

fn cmd_links_for(ctx: &Context, args: LinksForArgs) -> Result<(), CliError> {
    let store = open_initialized(ctx)?;
    let links = store.all_links_for(&args.id)?;
    store.close()?;

    print_json(&json!({
        "status": "ok",
        "id": args.id,
        "count": links.len(),
        "links": links.iter().map(link_to_json).collect::<Vec<_>>(),
    }))
}

fn cmd_clear(ctx: &Context) -> Result<(), CliError> {
    let mut store = open_initialized(ctx)?;
    let removed = store.clear()?;
    store.commit()?;
    store.close()?;

    print_json(&json!({
        "status": "ok",
        "removed": removed,
    }))
}

fn cmd_compare(args: &CompareArgs) -> Result<(), CliError> {
    print_json(&json!({
        "status": "ok",
        "similarity": Levenshtein.compare(&args.left, &args.right),
        "distance": distance(&args.left, &args.right),
        "tokenized": Levenshtein.is_tokenized(),
    }))
}

impl Context {
    fn spec(&self) -> ConnectionSpec {
        self.config.connection_spec(&self.paths.cwd, &self.paths.home)
    }
}

fn open_initialized(ctx: &Context) -> Result<LinkStore, CliError> {
    let spec = ctx.spec();
    require_initialized(&spec)?;
    Ok(LinkStore::open(&spec)?)
}

fn require_initialized(spec: &ConnectionSpec) -> Result<(), CliError> {
    if let StoreTarget::File(path) = &spec.target
        && !path.exists()
    {
        return Err(CliError::new(
            "not_initialized",
            format!(
                "link database {} does not exist; run `reclink init`",
                path.display()
            ),
        ));
    }
    Ok(())
}

fn repo_paths(cwd: PathBuf) -> Result<RepoPaths, CliError> {
    let home = home_dir()?;
    Ok(RepoPaths {
        repo_config: cwd.join(".reclink").join("config.yml"),
        user_config: home.join(".reclink").join("config.yml"),
        cwd,
        home,
    })
}

fn write_default_config(paths: &RepoPaths) -> Result<(), CliError> {
    let config_path = &paths.repo_config;
    if config_path.exists() {
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|err| CliError::io("mkdir_error", err))?;
    }
    fs::write(config_path, default_repo_config_yaml())
        .map_err(|err| CliError::io("write_error", err))
}

fn home_dir() -> Result<PathBuf, CliError> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| CliError::new("home_error", "HOME environment variable is not set"))
}

fn parse_kind(raw: &str) -> Result<LinkKind, String> {
    LinkKind::parse(raw).ok_or_else(|| {
        format!("unknown link kind `{raw}` (expected same, different or maybe-same)")
    })
}

fn parse_status(raw: &str) -> Result<LinkStatus, String> {
    LinkStatus::parse(raw).ok_or_else(|| {
        format!("unknown link status `{raw}` (expected inferred, asserted or retracted)")
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| format!("invalid RFC 3339 timestamp `{raw}`: {err}"))
}

fn link_to_json(link: &Link) -> Value {
    json!({
        "id1": link.id1,
        "id2": link.id2,
        "kind": link.kind.name(),
        "status": link.status.name(),
        "timestamp": link.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn target_json(target: &StoreTarget) -> Value {
    match target {
        StoreTarget::File(path) => json!(path_string(path)),
        StoreTarget::Memory => json!(":memory:"),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}
