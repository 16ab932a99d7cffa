use std::io::Write;
use std::sync::Arc;

use clap::Parser;

mod cli;
mod client;
mod config;
mod errors;
mod gateway;
mod logging;
mod player;
mod provider;
mod resolver;
#[cfg(test)]
mod tests;

use cli::{Args, Command};
use client::ApiClient;
use config::Config;
use errors::AppError;

fn main() -> anyhow::Result<()> {
    logging::init();

    let args = Args::parse();
    let config = Config::load();

    match args.command {
        Command::Daemon {} => gateway::start_daemon(config),

        Command::Download {
            url,
            format,
            quality,
            out_dir,
        } => {
            let client = ApiClient::new(&config.api_url);

            println!("Starting download...");
            match client.download(&url, format, quality, &out_dir) {
                Ok(path) => {
                    println!("Download complete: {}", path.display());
                    Ok(())
                }
                Err(AppError::EmptyUrl) => {
                    println!("Please enter a YouTube URL.");
                    Ok(())
                }
                Err(err) => {
                    log::error!("download failed: {err:?}");
                    println!("Download failed. Please try again.");
                    std::process::exit(1);
                }
            }
        }

        Command::Link { url } => {
            let client = ApiClient::new(&config.api_url);

            match client.resolve_direct_url(&url) {
                Ok(link) => {
                    println!("{link}");
                    Ok(())
                }
                Err(AppError::EmptyUrl) => {
                    println!("Please enter a YouTube URL.");
                    Ok(())
                }
                Err(err) => {
                    log::error!("link resolution failed: {err:?}");
                    println!("Could not resolve a download link. Please try again.");
                    std::process::exit(1);
                }
            }
        }

        Command::Resolve { url } => match resolver::extract_video_id(&url) {
            Some(id) => {
                println!("{id}");
                Ok(())
            }
            None => {
                println!("Not a recognized YouTube URL.");
                std::process::exit(1);
            }
        },

        Command::Preview { url } => preview(config, url),
    }
}

/// Interactive preview loop: each input line is resolved and cued into the
/// external player; ctrl-c cancels an in-flight cue before teardown.
fn preview(config: Config, first: Option<String>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let backend = Arc::new(player::MpvBackend::new(&config.player.bin));
        let mut controller = player::PlayerController::start(backend, &config.player);

        let mut pending = first;

        loop {
            let Some(line) = pending.take().or_else(read_line) else {
                break;
            };

            if line.is_empty() {
                continue;
            }

            let Some(id) = resolver::extract_video_id(&line) else {
                println!("Not a recognized YouTube URL.");
                continue;
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                res = controller.cue(&id) => match res {
                    Ok(()) => println!("Previewing {id}"),
                    Err(player::PreviewError::Unavailable) => {
                        println!("Preview unavailable.");
                        break;
                    }
                },
            }
        }

        controller.shutdown().await;

        Ok(())
    })
}

fn read_line() -> Option<String> {
    print!("url> ");
    let _ = std::io::stdout().flush();

    let mut buf = String::new();
    match std::io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}
