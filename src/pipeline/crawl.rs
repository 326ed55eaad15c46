// src/pipeline/crawl.rs

//! Organization census crawl.
//!
//! The crawl walks the search space in date windows that move backwards
//! from the present, pages through each window, enriches every organization
//! it has not collected yet, and checkpoints after every appended entity
//! and every cursor advance. An interrupted run resumes from the checkpoint
//! and produces the same collection as an uninterrupted one.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Config, Organization, RepoActivity, SearchUser};
use crate::pipeline::aggregate::aggregate_organization;
use crate::services::{Dispatcher, GithubApi, SearchOrder};
use crate::storage::{Checkpoint, CheckpointStore};

/// The search API refuses to page past this many results per query.
const SEARCH_RESULT_CEILING: u64 = 1_000;

/// What one crawl run accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Organizations in the checkpoint when the run ended
    pub organizations: usize,
    /// How many of those this run added
    pub added_this_run: usize,
    pub pages_fetched: u32,
    pub windows_scanned: u32,
    /// True when the run stopped on cancellation rather than completion
    pub interrupted: bool,
}

pub struct OrgCrawler {
    config: Arc<Config>,
    api: Arc<dyn GithubApi>,
    store: Arc<dyn CheckpointStore>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
}

impl OrgCrawler {
    pub fn new(
        config: Arc<Config>,
        api: Arc<dyn GithubApi>,
        store: Arc<dyn CheckpointStore>,
        dispatcher: Dispatcher,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            api,
            store,
            dispatcher,
            cancel,
        }
    }

    /// Drive the crawl to completion, cancellation, or a fatal error.
    ///
    /// State is persisted before every forward step, so calling `run` again
    /// after any outcome continues instead of starting over.
    pub async fn run(&self) -> Result<CrawlSummary> {
        let mut checkpoint = match self.store.load().await? {
            Some(checkpoint) => {
                log::info!(
                    "resuming crawl: {} organizations collected, window ending {} page {}",
                    checkpoint.len(),
                    checkpoint.window_end(),
                    checkpoint.page_cursor()
                );
                checkpoint
            }
            None => {
                let today = Utc::now().date_naive();
                log::info!("starting fresh crawl with window ending {today}");
                Checkpoint::fresh(today)
            }
        };

        let mut summary = CrawlSummary {
            organizations: checkpoint.len(),
            added_this_run: 0,
            pages_fetched: 0,
            windows_scanned: 0,
            interrupted: false,
        };

        let Some(floor) = self.oldest_creation_date().await? else {
            log::info!("search query matches nothing, crawl is already complete");
            self.store.save(&checkpoint).await?;
            return Ok(summary);
        };
        log::info!("oldest matching account joined on {floor}");

        while checkpoint.window_end() > floor {
            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let window_end = checkpoint.window_end();
            let window_start =
                window_end - Duration::days(i64::from(self.config.search.window_days) - 1);
            let page = checkpoint.page_cursor();
            let query = self.window_query(window_start, window_end);

            let page_data = self
                .dispatcher
                .execute(|token| {
                    self.api.search_orgs(
                        token,
                        &query,
                        page,
                        self.config.search.per_page,
                        SearchOrder::BestMatch,
                    )
                })
                .await?;
            summary.pages_fetched += 1;

            if page_data.total_count > SEARCH_RESULT_CEILING {
                log::warn!(
                    "window {window_start}..{window_end} matches {} accounts but search stops at {}; the tail is skipped, lower window_days to reach it",
                    page_data.total_count,
                    SEARCH_RESULT_CEILING
                );
            }

            let page_len = page_data.items.len() as u64;
            log::debug!(
                "window {window_start}..{window_end} page {page}: {page_len} candidates of {}",
                page_data.total_count
            );

            let fresh: Vec<SearchUser> = page_data
                .items
                .into_iter()
                .filter(|candidate| !checkpoint.contains(&candidate.login))
                .collect();

            // Bounded fan-out; results come back in page order so the
            // collected sequence is deterministic.
            let mut enriched = stream::iter(fresh.into_iter().map(|candidate| self.enrich(candidate)))
                .buffered(self.config.crawler.enrich_concurrency);

            while let Some(entity) = enriched.next().await {
                if let Some(org) = entity? {
                    log::info!(
                        "{}: {} stars, {} recent events across {} repos",
                        org.login,
                        org.total_repo_stars,
                        org.total_repo_recent_events,
                        org.public_repos
                    );
                    checkpoint.append(org);
                    self.store.save(&checkpoint).await?;
                    summary.added_this_run += 1;
                }
                if self.cancel.is_cancelled() {
                    break;
                }
            }

            if self.cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            // A denser-than-ceiling window can never satisfy its raw total;
            // advance once the reachable range is covered, or the next fetch
            // would ask for a page the API refuses to serve.
            let reachable = page_data.total_count.min(SEARCH_RESULT_CEILING);
            let scanned =
                u64::from(page - 1) * u64::from(self.config.search.per_page) + page_len;
            if page_len == 0 || scanned >= reachable {
                checkpoint.advance_window(self.config.search.window_days);
                summary.windows_scanned += 1;
                log::info!(
                    "window ending {window_end} done, {} organizations so far",
                    checkpoint.len()
                );
            } else {
                checkpoint.advance_page();
            }
            self.store.save(&checkpoint).await?;
        }

        summary.organizations = checkpoint.len();
        if summary.interrupted {
            log::warn!(
                "crawl interrupted, checkpoint holds {} organizations",
                checkpoint.len()
            );
        } else {
            log::info!(
                "crawl complete: {} organizations, window floor {floor} reached",
                checkpoint.len()
            );
        }
        Ok(summary)
    }

    /// Fetch everything about one candidate and fold it into an entity.
    ///
    /// Returns `None` for an organization with no repositories at all; such
    /// a login is not recorded as seen and stays eligible in later windows.
    async fn enrich(&self, candidate: SearchUser) -> Result<Option<Organization>> {
        let login = candidate.login;

        let repos = self
            .dispatcher
            .execute(|token| self.api.list_repos(token, &login))
            .await
            .map_err(|e| AppError::crawl(&login, e))?;
        if repos.is_empty() {
            log::debug!("{login}: no repositories yet, skipping");
            return Ok(None);
        }

        let profile = self
            .dispatcher
            .execute(|token| self.api.get_profile(token, &login))
            .await
            .map_err(|e| AppError::crawl(&login, e))?;

        let mut activity = Vec::with_capacity(repos.len());
        for repo in repos {
            let recent_events = match self
                .dispatcher
                .execute(|token| self.api.count_recent_events(token, &login, &repo.name))
                .await
            {
                Ok(count) => count,
                // A blocked repository contributes zero activity; the rest
                // of the organization still counts.
                Err(AppError::Blocked { reason }) => {
                    log::warn!(
                        "{login}/{}: access blocked ({reason}), counting zero events",
                        repo.name
                    );
                    0
                }
                Err(e) => {
                    return Err(AppError::crawl(format!("{login}/{}", repo.name), e));
                }
            };
            activity.push(RepoActivity {
                repo,
                recent_events,
            });
        }

        Ok(Some(aggregate_organization(profile, &activity)))
    }

    /// Creation date of the oldest account matching the base query, or
    /// `None` when the query matches nothing at all.
    async fn oldest_creation_date(&self) -> Result<Option<NaiveDate>> {
        let query = self.config.search.query.clone();

        let page = self
            .dispatcher
            .execute(|token| {
                self.api
                    .search_orgs(token, &query, 1, 1, SearchOrder::OldestFirst)
            })
            .await?;
        let Some(candidate) = page.items.into_iter().next() else {
            return Ok(None);
        };

        let login = candidate.login;
        let profile = self
            .dispatcher
            .execute(|token| self.api.get_profile(token, &login))
            .await?;
        Ok(Some(profile.created_at.date_naive()))
    }

    fn window_query(&self, start: NaiveDate, end: NaiveDate) -> String {
        format!("{} created:{start}..{end}", self.config.search.query)
    }
}
