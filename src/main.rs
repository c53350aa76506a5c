mod commands;
mod core;
mod pkgbuild;
mod release;
mod ui;
mod utils;

use clap::Parser;
use core::config::Environment;
use core::error::{ReleaseError, print_error};
use release::ReleaseOptions;
use std::path::PathBuf;

/// Commit, sign and publish a locally built pacman package
#[derive(Parser)]
#[command(name = "pkg-release")]
#[command(version, about, long_about = None)]
#[command(styles = get_styles())]
struct Cli {
  /// Package directory containing the PKGBUILD
  #[arg(short = 'C', long = "directory", value_name = "DIR", default_value = ".")]
  directory: PathBuf,

  /// Skip staging and committing
  #[arg(long)]
  no_commit: bool,

  /// Push the release commit to the upstream branch
  #[arg(long)]
  push: bool,

  /// Upload signed packages and update the remote database
  #[arg(long)]
  upload: bool,

  /// Enable debug logging
  #[arg(short, long)]
  verbose: bool,

  /// Note appended to the commit message (opens an editor when omitted)
  note: Option<String>,
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn init_logging(env: &Environment, verbose: bool) {
  let filter = match (env.get("PKG_RELEASE_LOG"), verbose) {
    (Some(filter), _) => filter,
    (None, true) => "debug",
    (None, false) => env.get("RUST_LOG").unwrap_or("info"),
  };

  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
    .with_writer(std::io::stderr)
    .with_target(false)
    .without_time()
    .init();
}

fn main() {
  let cli = Cli::parse();

  // The only place the process environment is read
  let env = Environment::capture();
  init_logging(&env, cli.verbose);

  let ctx = match core::context::ReleaseContext::build(&cli.directory, &env) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };

  let options = ReleaseOptions {
    commit: !cli.no_commit,
    push: cli.push,
    upload: cli.upload,
    note: cli.note,
  };

  if let Err(e) = commands::run_release(&ctx, &options) {
    handle_error(e);
  }
}

fn handle_error(err: ReleaseError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
