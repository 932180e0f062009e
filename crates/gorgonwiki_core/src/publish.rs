use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use similar::TextDiff;

use crate::mediawiki::{WikiReadApi, WikiWriteApi};

/// Generated pages in publish order: `(title, text)`.
pub type PageSet = Vec<(String, String)>;

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub summary: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublishAction {
    Unchanged,
    WouldCreate,
    WouldUpdate,
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishPageResult {
    pub title: String,
    pub action: PublishAction,
    /// Generated text, kept for dry runs so it can be shown instead of saved.
    pub preview: Option<String>,
    /// Unified diff from the live page to the generated text.
    pub diff: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub dry_run: bool,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub pages: Vec<PublishPageResult>,
    pub request_count: usize,
}

pub fn publish_pages<A: WikiWriteApi>(
    pages: &PageSet,
    options: &PublishOptions,
    api: &mut A,
    credentials: Option<(&str, &str)>,
) -> Result<PublishReport> {
    if options.summary.trim().is_empty() {
        bail!("publishing requires a non-empty edit summary");
    }

    let mut report = PublishReport {
        dry_run: options.dry_run,
        created: 0,
        updated: 0,
        unchanged: 0,
        pages: Vec::new(),
        request_count: 0,
    };
    if pages.is_empty() {
        report.request_count = api.request_count();
        return Ok(report);
    }

    if !options.dry_run {
        let (username, password) = credentials.ok_or_else(|| {
            anyhow::anyhow!("WIKI_BOT_USER and WIKI_BOT_PASS are required outside dry-run mode")
        })?;
        api.login(username, password).context("wiki login failed")?;
        tracing::info!(user = username, "logged in");
    }

    let titles = pages
        .iter()
        .map(|(title, _)| title.clone())
        .collect::<Vec<_>>();
    let live = fetch_live_texts(api, &titles)?;

    for (title, text) in pages {
        let current = live.get(title);
        if current.is_some_and(|current| current == text) {
            tracing::info!("No changes to {title}");
            report.unchanged += 1;
            report.pages.push(PublishPageResult {
                title: title.clone(),
                action: PublishAction::Unchanged,
                preview: None,
                diff: None,
            });
            continue;
        }

        let diff = current.map(|current| render_diff(title, current, text));
        let action = if options.dry_run {
            match current {
                Some(_) => PublishAction::WouldUpdate,
                None => PublishAction::WouldCreate,
            }
        } else {
            api.edit_page(title, text, &options.summary)
                .with_context(|| format!("failed to save {title}"))?;
            tracing::info!("Page saved: {title}");
            match current {
                Some(_) => PublishAction::Updated,
                None => PublishAction::Created,
            }
        };

        match action {
            PublishAction::Created | PublishAction::WouldCreate => report.created += 1,
            PublishAction::Updated | PublishAction::WouldUpdate => report.updated += 1,
            PublishAction::Unchanged => {}
        }
        report.pages.push(PublishPageResult {
            title: title.clone(),
            action,
            preview: options.dry_run.then(|| text.clone()),
            diff,
        });
    }

    report.request_count = api.request_count();
    Ok(report)
}

/// Live text keyed by requested title; pages that do not exist are absent.
pub fn fetch_live_texts<A: WikiReadApi + ?Sized>(
    api: &mut A,
    titles: &[String],
) -> Result<BTreeMap<String, String>> {
    Ok(api
        .get_page_contents(titles)?
        .into_iter()
        .map(|page| (page.title, page.content))
        .collect())
}

pub fn render_diff(title: &str, live: &str, generated: &str) -> String {
    TextDiff::from_lines(live, generated)
        .unified_diff()
        .context_radius(3)
        .header(&format!("live/{title}"), &format!("generated/{title}"))
        .to_string()
}

/// Prepend a namespace-style prefix to every title.
pub fn with_title_prefix(pages: BTreeMap<String, String>, prefix: &str) -> PageSet {
    pages
        .into_iter()
        .map(|(name, text)| (format!("{prefix}{name}"), text))
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::BTreeMap;

    use crate::mediawiki::{RemotePage, WikiReadApi, WikiWriteApi};

    #[derive(Default)]
    pub(crate) struct MockApi {
        pub(crate) pages: BTreeMap<String, String>,
        pub(crate) edits: Vec<(String, String, String)>,
        pub(crate) logged_in: bool,
        pub(crate) request_count: usize,
    }

    impl WikiReadApi for MockApi {
        fn get_page_contents(&mut self, titles: &[String]) -> anyhow::Result<Vec<RemotePage>> {
            self.request_count += 1;
            Ok(titles
                .iter()
                .filter_map(|title| {
                    self.pages.get(title).map(|content| RemotePage {
                        title: title.clone(),
                        content: content.clone(),
                    })
                })
                .collect())
        }

        fn request_count(&self) -> usize {
            self.request_count
        }
    }

    impl WikiWriteApi for MockApi {
        fn login(&mut self, _username: &str, _password: &str) -> anyhow::Result<()> {
            self.request_count += 1;
            self.logged_in = true;
            Ok(())
        }

        fn edit_page(&mut self, title: &str, content: &str, summary: &str) -> anyhow::Result<()> {
            self.request_count += 1;
            if !self.logged_in {
                anyhow::bail!("not logged in");
            }
            self.edits
                .push((title.to_string(), content.to_string(), summary.to_string()));
            self.pages.insert(title.to_string(), content.to_string());
            Ok(())
        }
    }
}
