use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::links::LinkExtractor;
use crate::report::{self, LinkCell, ResultRow};
use crate::slack::{self, DirectConversation, Fetched, SlackApi, UNKNOWN_USER};
use crate::throttle::{Clock, Throttle};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub users: usize,
    pub conversations: usize,
    pub rows: usize,
    pub rows_with_links: usize,
    pub failed_histories: usize,
    pub directory_complete: bool,
    pub conversations_complete: bool,
    pub output: PathBuf,
}

/// Scans every IM conversation and returns one row per conversation, sorted
/// by display name. Nothing is written.
pub fn collect_rows(
    config: &Config,
    api: &dyn SlackApi,
    clock: &dyn Clock,
) -> Result<(Vec<ResultRow>, RunSummary)> {
    config.validate()?;
    let extractor = LinkExtractor::new()?;
    let mut throttle = Throttle::new(&config.rate_limits, clock);

    let directory = slack::load_user_directory(api, &mut throttle, config.page_size);
    let directory_complete = directory.is_complete();
    if let Some(e) = directory.error() {
        warn!("user directory is incomplete ({}), unmatched users show as {}", e, UNKNOWN_USER);
    }
    let user_names = directory.into_items();
    info!("loaded {} users", user_names.len());

    let listing = slack::list_direct_conversations(api, &mut throttle, config.page_size);
    let conversations_complete = listing.is_complete();
    if let Some(e) = listing.error() {
        warn!("conversation list is incomplete: {}", e);
    }
    let conversations = listing.into_items();
    info!("found {} direct-message conversations", conversations.len());

    let mut rows = Vec::with_capacity(conversations.len());
    let mut failed_histories = 0;
    let total_batches = conversations.len().div_ceil(config.batch_size);

    for (index, batch) in conversations.chunks(config.batch_size).enumerate() {
        for DirectConversation { id, user } in batch {
            let name = user_names
                .get(user)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_USER);

            let links = match slack::fetch_history(api, &mut throttle, id, config.history_limit) {
                Fetched::Complete(messages) => {
                    let found = extractor.find_links(&messages);
                    if found.is_empty() {
                        LinkCell::NoLink
                    } else {
                        LinkCell::Found(found)
                    }
                }
                Fetched::Partial { error, .. } => {
                    failed_histories += 1;
                    LinkCell::FetchFailed(error.to_string())
                }
            };

            rows.push(ResultRow::new(name, links));
        }

        info!(
            "processed batch {}/{} ({} conversations)",
            index + 1,
            total_batches,
            batch.len()
        );
        throttle.cool_down(config.batch_cooldown);
    }

    report::sort_rows(&mut rows);

    let summary = RunSummary {
        users: user_names.len(),
        conversations: conversations.len(),
        rows: rows.len(),
        rows_with_links: rows.iter().filter(|r| r.links.has_links()).count(),
        failed_histories,
        directory_complete,
        conversations_complete,
        output: config.output_path.clone(),
    };

    Ok((rows, summary))
}

/// Full run: collect rows and write them to the configured output file.
pub fn run(config: &Config, api: &dyn SlackApi, clock: &dyn Clock) -> Result<RunSummary> {
    let (rows, summary) = collect_rows(config, api, clock)?;

    report::write_csv(&config.output_path, &rows)?;

    info!(
        "wrote {} rows to {} ({} with links, {} failed history fetches)",
        summary.rows,
        summary.output.display(),
        summary.rows_with_links,
        summary.failed_histories
    );
    Ok(summary)
}
