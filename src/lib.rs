//! `substack-publish` turns a Markdown file into a published Substack post.
//!
//! The first non-blank line of the file becomes the post title and the rest is
//! converted into Substack's draft document format. When a post with the same
//! title already exists it is updated in place; otherwise a new draft is
//! created. Either way the draft is then published, and newly created posts
//! are recorded in a local Markdown table.
//!
//! # Example
//!
//! ```rust
//! use substack_publish::article::Article;
//! use substack_publish::draft::{markdown_to_document, DraftPayload};
//!
//! # fn demo() -> substack_publish::error::Result<()> {
//! let article = Article::parse("# Release notes\n\n---\n\nWe shipped **it**.\n");
//! assert_eq!(article.title, "Release notes");
//!
//! let document = markdown_to_document(&article.body)?;
//! let payload = DraftPayload::new(&article.title, "", 42, &document);
//! assert!(payload.draft_body.contains("shipped"));
//! # Ok(())
//! # }
//! ```
//!
//! Talking to Substack goes through the [`api::PublishingApi`] trait, so the
//! [`publisher::publish`] sequence runs the same against
//! [`api::SubstackClient`] or an in-memory fake.

pub mod api;
pub mod article;
pub mod config;
pub mod draft;
pub mod error;
pub mod ledger;
pub mod publisher;

pub use api::{PublishingApi, SubstackClient};
pub use article::Article;
pub use error::{PublishError, Result};
pub use publisher::{publish, PublishOutcome, PublishRequest};
