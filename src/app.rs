use crate::cli::Cli;
use anyhow::Context;
use chrono::Local;
use clap::Parser;
use log::debug;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use substack_publish::api::{PublishOptions, SubstackClient};
use substack_publish::article::Article;
use substack_publish::config::{
    executable_dir, resolve_article_path, Config, PublishMode, CONFIG_FILE_NAME,
};
use substack_publish::draft::markdown_to_document;
use substack_publish::error::PublishError;
use substack_publish::publisher::{publish, PublishRequest};

pub fn run() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let base_dir = cli
        .base_dir
        .clone()
        .or_else(executable_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    debug!("Using base directory {}", base_dir.display());

    let article_path = resolve_article_path(&cli.article, &base_dir)?;
    let article = Article::from_path(&article_path)
        .with_context(|| format!("Failed to read input file: {}", article_path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if cli.dry_run {
        print_summary(&article, &mut out)?;
        let document = markdown_to_document(&article.body)?;
        writeln!(out, "{document:#}")?;
        return Ok(());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| base_dir.join(CONFIG_FILE_NAME));
    let config = load_config(&config_path, &mut out)?;

    print_summary(&article, &mut out)?;
    writeln!(out, "Connecting to Substack...")?;
    let client = SubstackClient::connect(&config.cookie, config.publication_base())?;

    let mode = cli
        .mode
        .map(PublishMode::from)
        .or(config.mode)
        .unwrap_or_default();
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| config.log_path(&base_dir));
    let filename = article_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let request = PublishRequest {
        article: &article,
        filename: &filename,
        subtitle: &cli.subtitle,
        mode,
        options: PublishOptions {
            send: !cli.no_email,
            ..PublishOptions::default()
        },
        publication_base: config.publication_base(),
        log_path: &log_path,
        date: Local::now().date_naive(),
    };
    debug!("Publishing {} in {:?} mode", article_path.display(), mode);

    publish(&client, &request, &mut out)?;
    Ok(())
}

fn print_summary(article: &Article, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Title: {}", article.title)?;
    writeln!(out, "Body: {} chars", article.body.chars().count())
}

/// Loads the configuration, printing a template to stdout when the file is missing.
fn load_config(path: &Path, out: &mut impl Write) -> anyhow::Result<Config> {
    match Config::load(path) {
        Err(PublishError::ConfigMissing(missing)) => {
            let name = missing
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| CONFIG_FILE_NAME.to_string());
            writeln!(out, "Missing {name}. Create it with:")?;
            writeln!(out, "{}", Config::template())?;
            out.flush()?;
            Err(PublishError::ConfigMissing(missing).into())
        }
        other => Ok(other?),
    }
}
