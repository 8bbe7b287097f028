use super::args::*;
use anyhow::Context;
use querygate_core::config::{load_or_default, write_sample_config, QuerygateConfig};
use querygate_core::PipelineContext;

pub mod ask;
pub mod bench;
pub mod catalog;
pub mod check;
pub mod rag;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const FATAL: i32 = 1;
    /// Candidate rejected or a release gate failed.
    pub const REJECTED: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Bench(args) => bench::run(args).await,
        Command::Check(args) => check::run(args).await,
        Command::Ask(args) => ask::run(args).await,
        Command::Catalog(args) => match args.cmd {
            CatalogSub::Import(a) => catalog::import(a),
            CatalogSub::List(a) => catalog::list(a),
        },
        Command::Rag(args) => match args.cmd {
            RagSub::Add(a) => rag::add(a).await,
            RagSub::Search(a) => rag::search(a),
        },
        Command::History(args) => bench::history(args),
        Command::Init(args) => cmd_init(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    if args.config.exists() {
        eprintln!("note: {} already exists", args.config.display());
        return Ok(exit_codes::OK);
    }
    if let Some(parent) = args.config.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_sample_config(&args.config)?;
    eprintln!("created {}", args.config.display());
    Ok(exit_codes::OK)
}

pub(crate) fn load_config(args: &ConfigArgs) -> anyhow::Result<QuerygateConfig> {
    let mut cfg = load_or_default(&args.config, args.strict_config)
        .map_err(|e| anyhow::anyhow!("config error: {}", e))?;
    if let Some(db) = &args.db {
        cfg.store.path = db.clone();
    }
    Ok(cfg)
}

pub(crate) fn open_context(args: &ConfigArgs) -> anyhow::Result<PipelineContext> {
    let cfg = load_config(args)?;
    PipelineContext::open(cfg).context("failed to initialize pipeline context")
}
