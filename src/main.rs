#[macro_use]
extern crate log;

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::mpsc;
use tokio::time;

use config::Config;
use controller::{Navigator, SharedApi, VotingController};
use operations::{HttpVotingApi, VotingApi};
use page::{Document, Element, Field, MemoryDocument};

mod config;
mod controller;
mod countdown;
mod model;
mod operations;
mod page;
mod poller;
mod render;
mod util;

enum PageAction {
    Reload,
    Navigate(String),
}

struct ChannelNavigator {
    tx: mpsc::UnboundedSender<PageAction>,
}

impl Navigator for ChannelNavigator {
    fn reload(&self) {
        if self.tx.send(PageAction::Reload).is_err() {
            warn!("page closed, dropping reload");
        }
    }

    fn navigate(&self, url: &str) {
        if self.tx.send(PageAction::Navigate(url.to_string())).is_err() {
            warn!("page closed, dropping navigation to {}", url);
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    run()
        .await
        .expect("Failed to run voting agent.")
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;
    let api: SharedApi = Arc::new(HttpVotingApi::new(&config.base_url, config.http_timeout)?);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let navigator = Arc::new(ChannelNavigator { tx });

    let mut document = Arc::new(voting_page(&config));
    let mut controller = VotingController::attach(document.clone(), api.clone(), navigator.clone(), config.resync)?;

    let shutdown = signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut redraw = time::interval(Duration::from_secs(1));
    let mut last_drawn = BTreeMap::new();

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupted, shutting down");
                break;
            }
            Some(action) = rx.recv() => {
                controller.destroy();
                document = match action {
                    PageAction::Reload => {
                        info!("reloading voting page for event {}", config.event_id);
                        Arc::new(voting_page(&config))
                    }
                    PageAction::Navigate(url) => {
                        info!("navigating to {}", url);
                        Arc::new(results_page(&config, api.as_ref()).await)
                    }
                };
                controller = VotingController::attach(document.clone(), api.clone(), navigator.clone(), config.resync)?;
                debug!("page for event {} attached", controller.event().event_id);
            }
            _ = redraw.tick() => {
                last_drawn = draw(&document, last_drawn);
            }
        }
    }

    controller.destroy();
    Ok(())
}

fn event_data(config: &Config) -> MemoryDocument {
    let document = MemoryDocument::new();
    document.insert_field(Field::EventData);
    let id = Field::EventData.element_id();
    document.set_attribute(&id, "data-event-id", &config.event_id.to_string());
    document.set_attribute(&id, "data-results-url", &config.results_url);
    document
}

fn voting_page(config: &Config) -> MemoryDocument {
    let document = event_data(config);
    for field in vec!(
        Field::TimeUntilStart,
        Field::TimeRemaining,
        Field::TotalVotesCount,
        Field::StatusBadge,
    ) {
        document.insert_field(field);
    }
    document
}

/// Results markup: one set of option elements per option the server knows
/// about when the page is built.
async fn results_page(config: &Config, api: &(dyn VotingApi + Send + Sync)) -> MemoryDocument {
    let document = event_data(config);
    document.insert_field(Field::StatusBadge);
    document.insert_field(Field::ResultsContainer);
    document.insert_field(Field::TotalVotesDisplay);

    match api.voting_results(config.event_id).await {
        Ok(response) => match response.into_data() {
            Some(results) => {
                for option in results.options.iter() {
                    document.insert_field(Field::OptionCount(option.id));
                    document.insert_field(Field::OptionPercent(option.id));
                    document.insert_field(Field::OptionProgress(option.id));
                    document.insert_field(Field::OptionCard(option.id));
                }
            }
            None => warn!("results not available yet for event {}", config.event_id),
        },
        Err(e) => error!("failed to load results markup: {}", e),
    }
    document
}

fn draw(document: &MemoryDocument, last_drawn: BTreeMap<String, Element>) -> BTreeMap<String, Element> {
    let snapshot = document.snapshot();
    if snapshot != last_drawn {
        println!("----");
        for line in document.render_lines() {
            println!("{}", line);
        }
    }
    snapshot
}
