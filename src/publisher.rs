//! Drives the remote calls that turn an article into a published post.

use crate::api::{PublishOptions, PublishingApi, RemotePost};
use crate::article::Article;
use crate::config::{post_url, PublishMode};
use crate::draft::{markdown_to_document, DraftPayload};
use crate::error::Result;
use crate::ledger::PublishLogEntry;
use chrono::NaiveDate;
use log::{info, warn};
use std::io::Write;
use std::path::Path;

/// Everything needed to publish one article.
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub article: &'a Article,
    /// Base name of the article file, used as the link target in the log.
    pub filename: &'a str,
    pub subtitle: &'a str,
    pub mode: PublishMode,
    pub options: PublishOptions,
    /// Publication URL without a trailing slash.
    pub publication_base: &'a str,
    pub log_path: &'a Path,
    pub date: NaiveDate,
}

/// What happened on the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub draft_id: u64,
    pub slug: String,
    pub url: String,
    /// `false` when an existing post was updated.
    pub created: bool,
}

/// Creates or updates the draft for `request.article`, publishes it and, for
/// newly created posts, appends a row to the publish log.
///
/// Progress lines are written to `out`. Remote failures are returned as-is,
/// except a failed lookup of existing posts, which falls back to creating.
pub fn publish<A, W>(api: &A, request: &PublishRequest<'_>, out: &mut W) -> Result<PublishOutcome>
where
    A: PublishingApi + ?Sized,
    W: Write,
{
    let article = request.article;
    let user_id = api.user_id()?;

    let existing = match request.mode {
        PublishMode::Upsert => find_existing_post(api, &article.title, out)?,
        PublishMode::Create => None,
    };

    match &existing {
        Some(post) => {
            writeln!(out, "Found existing post (id: {})", post.id)?;
            writeln!(out, "Updating existing post...")?;
        }
        None => writeln!(out, "No existing post found. Creating new draft...")?,
    }

    let document = markdown_to_document(&article.body)?;
    let payload = DraftPayload::new(&article.title, request.subtitle, user_id, &document);

    let (draft_id, draft) = match &existing {
        Some(post) => {
            let draft = api.update_draft(post.id, &payload.with_id(post.id))?;
            writeln!(out, "Draft updated (id: {})", post.id)?;
            (post.id, draft)
        }
        None => {
            let draft = api.create_draft(&payload)?;
            writeln!(out, "Draft created (id: {})", draft.id)?;
            (draft.id, draft)
        }
    };

    writeln!(out, "Publishing...")?;
    api.prepublish_draft(draft_id)?;
    api.publish_draft(draft_id, request.options)?;

    let slug = draft
        .slug
        .or_else(|| existing.as_ref().and_then(|post| post.slug.clone()))
        .unwrap_or_default();
    let url = post_url(request.publication_base, &slug);
    let created = existing.is_none();

    if created {
        writeln!(out, "Published: \"{}\"", article.title)?;
    } else {
        writeln!(out, "Updated: \"{}\"", article.title)?;
    }
    writeln!(out, "URL: {url}")?;
    info!("Draft {draft_id} is live at {url}");

    if created {
        PublishLogEntry::new(request.date, &article.title, request.filename, &article.body)
            .append_to(request.log_path)?;
    }

    Ok(PublishOutcome {
        draft_id,
        slug,
        url,
        created,
    })
}

/// Looks for a post titled exactly `title`. A failed lookup counts as no match,
/// and an untitled article never matches anything.
fn find_existing_post<A, W>(api: &A, title: &str, out: &mut W) -> Result<Option<RemotePost>>
where
    A: PublishingApi + ?Sized,
    W: Write,
{
    if title.trim().is_empty() {
        info!("Article has no title, skipping lookup of existing posts");
        return Ok(None);
    }

    match api.list_posts() {
        Ok(posts) => Ok(posts.into_iter().find(|post| post.title == title)),
        Err(err) => {
            warn!("Post lookup failed, creating a new draft instead: {err}");
            writeln!(out, "Note: Could not search existing posts: {err}")?;
            Ok(None)
        }
    }
}
