mod args;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, bail};
use clap::Parser;
use tokio::io::BufReader;

use args::{Args, Command, QueryArgs, ServiceArgs, SessionArgs};
use practitioner_lookup::dispatch::{Dispatcher, HttpTransport};
use practitioner_lookup::query::{BatchSource, QueryPlan, run_query};
use practitioner_lookup::session::Session;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.cmd {
        Command::Query(cmd) => query(cmd).await.context("query failed"),
        Command::Session(cmd) => session(cmd).await.context("session failed"),
    }
}

fn dispatcher(service: &ServiceArgs) -> anyhow::Result<Dispatcher> {
    if service.no_color {
        colored::control::set_override(false);
    }
    let transport = HttpTransport::new(
        service.base_url.clone(),
        Duration::from_secs(service.timeout_secs),
        service.max_retries,
    )?;
    Ok(Dispatcher::new(Arc::new(transport)))
}

async fn query(cmd: QueryArgs) -> anyhow::Result<()> {
    let source = match (&cmd.json, &cmd.file) {
        (Some(json), _) => BatchSource::Json(json.clone()),
        (None, Some(path)) => BatchSource::File {
            path: path.clone(),
            content_type: cmd.content_type.clone(),
        },
        (None, None) if cmd.single => match cmd.practitioners.as_slice() {
            [record] => BatchSource::Single(record.clone()),
            _ => bail!("--single takes exactly one --practitioner"),
        },
        (None, None) if !cmd.practitioners.is_empty() => {
            BatchSource::Records(cmd.practitioners.clone())
        }
        (None, None) => bail!("nothing to look up; pass --practitioner, --json or --file"),
    };
    let plan = QueryPlan {
        source,
        endpoint: cmd.endpoint,
        consensus: cmd.consensus,
        page_size: cmd.service.page_size,
        sort: cmd.sort(),
        download_dir: cmd.download_dir.clone(),
        export_csv_dir: cmd.export_csv_dir.clone(),
    };
    let dispatcher = dispatcher(&cmd.service)?;
    let mut stdout = std::io::stdout();
    run_query(dispatcher, plan, &mut stdout).await
}

async fn session(cmd: SessionArgs) -> anyhow::Result<()> {
    let dispatcher = dispatcher(&cmd.service)?;
    let mut session = Session::new(dispatcher, cmd.service.page_size, cmd.download_dir);
    println!("practitioner lookup against {}; type help", cmd.service.base_url);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    session.run(stdin, &mut stdout).await
}
