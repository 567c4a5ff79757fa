pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod error;
pub mod filter;
pub mod render;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::backend::{
  LocalBackend,
  RemoteBackend
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting checkmark CLI"
  );
  debug!(
    overrides = pre.rc_overrides.len(),
    "preprocessed rc overrides"
  );

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .iter()
        .map(|kv| {
          (
            kv.key.clone(),
            kv.value.clone()
          )
        })
    )
  );
  if let Some(kind) = &cli.backend {
    cfg.set("backend", kind);
  }
  if let Some(mode) = &cli.filter {
    cfg.set("filter", mode);
  }
  if cli.yes {
    cfg.set("confirmation", "off");
  }

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let datastore =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let local = LocalBackend::new(
    Box::new(datastore),
    cfg.storage_key()
  );
  let remote = RemoteBackend::new(
    cfg.remote_config()?
  )
  .context(
    "failed to build HTTP client"
  )?;

  let mut task_store =
    store::TaskStore::new(
      Box::new(local),
      Box::new(remote),
      cfg.initial_backend()?
    );
  let _ = task_store
    .set_filter(cfg.initial_filter()?);

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  let mut session =
    commands::Session::new(
      task_store,
      renderer,
      cfg.confirmation()?
    );

  runtime.block_on(async {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout().lock();

    session.start(&mut out).await?;
    if inv.command == "shell" {
      session
        .run_shell(
          &cfg, &mut input, &mut out
        )
        .await?;
    } else {
      session
        .dispatch(
          &inv, &mut input, &mut out
        )
        .await?;
    }
    anyhow::Ok(())
  })?;

  info!("done");
  Ok(())
}
