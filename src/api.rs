//! The remote operations the publisher depends on, and their Substack implementation.

use crate::draft::DraftPayload;
use crate::error::{PublishError, Result};
use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const SUBSTACK_API: &str = "https://substack.com/api/v1";
const PAGE_SIZE: usize = 25;
const MAX_PAGES: usize = 40;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether a post is still a draft or already live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostStatus {
    Draft,
    Published,
}

/// A post as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePost {
    pub id: u64,
    pub title: String,
    pub slug: Option<String>,
    pub status: PostStatus,
}

/// The draft returned after a create or update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Draft {
    pub id: u64,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Options sent with the final publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishOptions {
    /// Email the post to subscribers.
    pub send: bool,
    pub share_automatically: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            send: true,
            share_automatically: false,
        }
    }
}

/// The remote calls made while publishing an article.
///
/// Authentication happens when an implementation is constructed; every method
/// acts on behalf of that session.
pub trait PublishingApi {
    fn user_id(&self) -> Result<u64>;
    fn list_posts(&self) -> Result<Vec<RemotePost>>;
    fn create_draft(&self, payload: &DraftPayload) -> Result<Draft>;
    fn update_draft(&self, id: u64, payload: &DraftPayload) -> Result<Draft>;
    fn prepublish_draft(&self, id: u64) -> Result<()>;
    fn publish_draft(&self, id: u64, options: PublishOptions) -> Result<()>;
}

#[derive(Deserialize)]
struct Profile {
    id: u64,
}

#[derive(Deserialize)]
struct ListedPost {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    draft_title: Option<String>,
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PostListing {
    Wrapped { posts: Vec<ListedPost> },
    Bare(Vec<ListedPost>),
}

impl PostListing {
    /// Raw entry count, including untitled posts that `into_posts` drops.
    fn len(&self) -> usize {
        match self {
            PostListing::Wrapped { posts } | PostListing::Bare(posts) => posts.len(),
        }
    }

    fn into_posts(self, status: PostStatus) -> Vec<RemotePost> {
        let posts = match self {
            PostListing::Wrapped { posts } | PostListing::Bare(posts) => posts,
        };

        posts
            .into_iter()
            .filter_map(|post| {
                let title = [post.title, post.draft_title]
                    .into_iter()
                    .flatten()
                    .find(|title| !title.trim().is_empty())?;
                Some(RemotePost {
                    id: post.id,
                    title,
                    slug: post.slug,
                    status,
                })
            })
            .collect()
    }
}

/// A cookie-authenticated session against one Substack publication.
pub struct SubstackClient {
    http: Client,
    api_base: String,
    publication_api: String,
}

impl fmt::Debug for SubstackClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstackClient")
            .field("http", &"<reqwest::blocking::Client>")
            .field("cookie", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("publication_api", &self.publication_api)
            .finish()
    }
}

impl SubstackClient {
    /// Builds a client that sends `substack.sid=<cookie>` with every request.
    pub fn connect(cookie: &str, publication_url: &str) -> Result<Self> {
        let mut cookie_header = HeaderValue::from_str(&format!("substack.sid={cookie}"))
            .map_err(|_| PublishError::InvalidCookie)?;
        cookie_header.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie_header);

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: SUBSTACK_API.to_string(),
            publication_api: publication_api_url(publication_url),
        })
    }

    /// Points account-level calls at a different API root.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn drafts_url(&self, suffix: &str) -> String {
        format!("{}/drafts{}", self.publication_api, suffix)
    }

    fn send(&self, method: &str, url: &str, request: RequestBuilder) -> Result<Response> {
        debug!("{method} {url}");
        let response = request.send()?;
        check_status(response)
    }

    fn list_page(&self, listing: &str, offset: usize) -> Result<PostListing> {
        let url = format!("{}/post_management/{listing}", self.publication_api);
        let request = self
            .http
            .get(&url)
            .query(&[("offset", offset), ("limit", PAGE_SIZE)]);
        Ok(self.send("GET", &url, request)?.json()?)
    }
}

impl PublishingApi for SubstackClient {
    fn user_id(&self) -> Result<u64> {
        let url = format!("{}/user/profile/self", self.api_base);
        let profile: Profile = self.send("GET", &url, self.http.get(&url))?.json()?;
        Ok(profile.id)
    }

    fn list_posts(&self) -> Result<Vec<RemotePost>> {
        let mut posts = Vec::new();

        for (listing, status) in [
            ("drafts", PostStatus::Draft),
            ("published", PostStatus::Published),
        ] {
            let paged = collect_pages(MAX_PAGES, |offset| self.list_page(listing, offset))?;
            if paged.truncated {
                warn!(
                    "Stopped listing {listing} posts after {} pages; a post with the same title may be missed",
                    MAX_PAGES
                );
            }
            posts.extend(paged.into_posts(status));
        }

        debug!("Listed {} existing posts", posts.len());
        Ok(posts)
    }

    fn create_draft(&self, payload: &DraftPayload) -> Result<Draft> {
        let url = self.drafts_url("");
        let request = self.http.post(&url).json(payload);
        Ok(self.send("POST", &url, request)?.json()?)
    }

    fn update_draft(&self, id: u64, payload: &DraftPayload) -> Result<Draft> {
        let url = self.drafts_url(&format!("/{id}"));
        let request = self.http.put(&url).json(payload);
        Ok(self.send("PUT", &url, request)?.json()?)
    }

    fn prepublish_draft(&self, id: u64) -> Result<()> {
        let url = self.drafts_url(&format!("/{id}/prepublish"));
        self.send("GET", &url, self.http.get(&url))?;
        Ok(())
    }

    fn publish_draft(&self, id: u64, options: PublishOptions) -> Result<()> {
        let url = self.drafts_url(&format!("/{id}/publish"));
        let request = self.http.post(&url).json(&options);
        self.send("POST", &url, request)?;
        Ok(())
    }
}

/// Listing entries gathered page by page.
struct Paged {
    entries: Vec<PostListing>,
    /// Every allowed page came back full, so more may exist.
    truncated: bool,
}

impl Paged {
    fn into_posts(self, status: PostStatus) -> Vec<RemotePost> {
        self.entries
            .into_iter()
            .flat_map(|page| page.into_posts(status))
            .collect()
    }
}

/// Fetches pages by offset until one comes back short or `max_pages` is reached.
fn collect_pages<F>(max_pages: usize, mut fetch: F) -> Result<Paged>
where
    F: FnMut(usize) -> Result<PostListing>,
{
    let mut entries = Vec::new();
    for page in 0..max_pages {
        let listing = fetch(page * PAGE_SIZE)?;
        let full = listing.len() >= PAGE_SIZE;
        entries.push(listing);
        if !full {
            return Ok(Paged {
                entries,
                truncated: false,
            });
        }
    }

    Ok(Paged {
        entries,
        truncated: max_pages > 0,
    })
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().unwrap_or_default();
    Err(PublishError::Http {
        status: status.as_u16(),
        url,
        body,
    })
}

/// `https://name.substack.com/` becomes `https://name.substack.com/api/v1`.
pub fn publication_api_url(publication_url: &str) -> String {
    format!("{}/api/v1", publication_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publication_api_url_ignores_trailing_slash() {
        assert_eq!(
            publication_api_url("https://me.substack.com/"),
            "https://me.substack.com/api/v1"
        );
        assert_eq!(
            publication_api_url("https://me.substack.com"),
            "https://me.substack.com/api/v1"
        );
    }

    #[test]
    fn wrapped_listing_prefers_title_over_draft_title() {
        let listing: PostListing = serde_json::from_str(
            r#"{"posts": [
                {"id": 1, "title": "Live", "draft_title": "Live (edited)", "slug": "live"},
                {"id": 2, "title": null, "draft_title": "Unsent", "slug": null},
                {"id": 3, "title": "", "draft_title": "Blank title"}
            ], "total": 3}"#,
        )
        .unwrap();

        let posts = listing.into_posts(PostStatus::Draft);
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].title, "Live");
        assert_eq!(posts[0].slug.as_deref(), Some("live"));
        assert_eq!(posts[1].title, "Unsent");
        assert_eq!(posts[1].slug, None);
        assert_eq!(posts[2].title, "Blank title");
        assert!(posts.iter().all(|p| p.status == PostStatus::Draft));
    }

    #[test]
    fn untitled_posts_are_dropped_from_listing() {
        let listing: PostListing = serde_json::from_str(
            r#"{"posts": [
                {"id": 9, "title": null, "draft_title": null},
                {"id": 10, "title": "", "draft_title": "  "},
                {"id": 11},
                {"id": 12, "title": "Kept"}
            ]}"#,
        )
        .unwrap();

        let posts = listing.into_posts(PostStatus::Draft);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, 12);
        assert_eq!(posts[0].title, "Kept");
    }

    #[test]
    fn bare_listing_is_accepted() {
        let listing: PostListing =
            serde_json::from_str(r#"[{"id": 7, "title": "Hello", "slug": "hello"}]"#).unwrap();
        let posts = listing.into_posts(PostStatus::Published);
        assert_eq!(
            posts,
            vec![RemotePost {
                id: 7,
                title: "Hello".to_string(),
                slug: Some("hello".to_string()),
                status: PostStatus::Published,
            }]
        );
    }

    #[test]
    fn draft_response_ignores_extra_fields() {
        let draft: Draft =
            serde_json::from_str(r#"{"id": 5, "slug": "post", "draft_title": "x"}"#).unwrap();
        assert_eq!(draft.id, 5);
        assert_eq!(draft.slug.as_deref(), Some("post"));
    }

    #[test]
    fn publish_options_default_to_sending_email() {
        let value = serde_json::to_value(PublishOptions::default()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "send": true, "share_automatically": false })
        );
    }

    fn listed(count: usize) -> PostListing {
        PostListing::Bare(
            (0..count)
                .map(|i| ListedPost {
                    id: i as u64,
                    title: Some(format!("Post {i}")),
                    draft_title: None,
                    slug: None,
                })
                .collect(),
        )
    }

    #[test]
    fn paging_stops_on_short_page() {
        let mut offsets = Vec::new();
        let paged = collect_pages(MAX_PAGES, |offset| {
            offsets.push(offset);
            Ok(listed(if offset == 0 { PAGE_SIZE } else { 3 }))
        })
        .unwrap();

        assert_eq!(offsets, vec![0, PAGE_SIZE]);
        assert!(!paged.truncated);
        assert_eq!(paged.into_posts(PostStatus::Draft).len(), PAGE_SIZE + 3);
    }

    #[test]
    fn paging_reports_truncation_at_page_cap() {
        let mut calls = 0;
        let paged = collect_pages(3, |_| {
            calls += 1;
            Ok(listed(PAGE_SIZE))
        })
        .unwrap();

        assert_eq!(calls, 3);
        assert!(paged.truncated);
        assert_eq!(paged.into_posts(PostStatus::Published).len(), 3 * PAGE_SIZE);
    }

    #[test]
    fn full_page_of_untitled_posts_keeps_paging() {
        let mut offsets = Vec::new();
        let untitled = || {
            PostListing::Bare(
                (0..PAGE_SIZE)
                    .map(|i| ListedPost {
                        id: i as u64,
                        title: None,
                        draft_title: None,
                        slug: None,
                    })
                    .collect(),
            )
        };
        let paged = collect_pages(MAX_PAGES, |offset| {
            offsets.push(offset);
            Ok(if offset == 0 { untitled() } else { listed(1) })
        })
        .unwrap();

        assert_eq!(offsets, vec![0, PAGE_SIZE]);
        assert_eq!(paged.into_posts(PostStatus::Draft).len(), 1);
    }

    #[test]
    fn paging_propagates_fetch_errors() {
        let result = collect_pages(MAX_PAGES, |_| Err(PublishError::InvalidCookie));
        assert!(matches!(result, Err(PublishError::InvalidCookie)));
    }

    #[test]
    fn rejects_cookie_with_control_characters() {
        let err = SubstackClient::connect("bad\ncookie", "https://me.substack.com").unwrap_err();
        assert!(matches!(err, PublishError::InvalidCookie));
    }

    #[test]
    fn debug_output_redacts_cookie() {
        let client = SubstackClient::connect("secret-sid", "https://me.substack.com").unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-sid"));
        assert!(debug.contains("https://me.substack.com/api/v1"));
    }

    mod http {
        use super::*;
        use crate::draft::DraftPayload;
        use std::io::{BufRead, BufReader, Read, Write};
        use std::net::TcpListener;
        use std::thread::{self, JoinHandle};

        const COOKIE_VALUE: &str = "test-sid";

        #[derive(Debug)]
        struct Recorded {
            request_line: String,
            headers: Vec<(String, String)>,
            body: String,
        }

        impl Recorded {
            fn header(&self, name: &str) -> Option<&str> {
                self.headers
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.as_str())
            }
        }

        /// Answers one connection per canned response, in order, and hands back what was asked.
        fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<Recorded>>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());

            let handle = thread::spawn(move || {
                responses
                    .into_iter()
                    .map(|(status, body)| {
                        let (mut stream, _) = listener.accept().unwrap();
                        let mut reader = BufReader::new(stream.try_clone().unwrap());

                        let mut request_line = String::new();
                        reader.read_line(&mut request_line).unwrap();

                        let mut headers = Vec::new();
                        loop {
                            let mut line = String::new();
                            reader.read_line(&mut line).unwrap();
                            let line = line.trim_end();
                            if line.is_empty() {
                                break;
                            }
                            if let Some((name, value)) = line.split_once(':') {
                                headers.push((
                                    name.trim().to_ascii_lowercase(),
                                    value.trim().to_string(),
                                ));
                            }
                        }

                        let length = headers
                            .iter()
                            .find(|(name, _)| name == "content-length")
                            .map(|(_, value)| value.parse::<usize>().unwrap())
                            .unwrap_or(0);
                        let mut buf = vec![0; length];
                        reader.read_exact(&mut buf).unwrap();

                        write!(
                            stream,
                            "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                            body.len()
                        )
                        .unwrap();
                        stream.flush().unwrap();

                        Recorded {
                            request_line: request_line.trim_end().to_string(),
                            headers,
                            body: String::from_utf8(buf).unwrap(),
                        }
                    })
                    .collect()
            });

            (base, handle)
        }

        fn client(base: &str) -> SubstackClient {
            SubstackClient::connect(COOKIE_VALUE, base)
                .unwrap()
                .with_api_base(&format!("{base}/api/v1"))
        }

        fn page(start: usize, count: usize) -> String {
            let posts: Vec<_> = (start..start + count)
                .map(|id| serde_json::json!({ "id": id, "title": format!("Post {id}") }))
                .collect();
            serde_json::json!({ "posts": posts }).to_string()
        }

        fn payload() -> DraftPayload {
            DraftPayload::new("Title", "", 1, &serde_json::json!({ "type": "doc", "content": [] }))
        }

        #[test]
        fn lists_drafts_then_published_until_short_page() {
            let (base, server) = serve(vec![
                (200, page(0, PAGE_SIZE)),
                (200, page(PAGE_SIZE, 1)),
                (200, "[]".to_string()),
            ]);

            let posts = client(&base).list_posts().unwrap();
            let requests = server.join().unwrap();

            assert_eq!(posts.len(), PAGE_SIZE + 1);
            assert!(posts.iter().all(|p| p.status == PostStatus::Draft));
            let lines: Vec<_> = requests.iter().map(|r| r.request_line.as_str()).collect();
            assert_eq!(
                lines,
                vec![
                    "GET /api/v1/post_management/drafts?offset=0&limit=25 HTTP/1.1",
                    "GET /api/v1/post_management/drafts?offset=25&limit=25 HTTP/1.1",
                    "GET /api/v1/post_management/published?offset=0&limit=25 HTTP/1.1",
                ]
            );
            for request in &requests {
                assert_eq!(request.header("cookie"), Some("substack.sid=test-sid"));
            }
        }

        #[test]
        fn non_success_status_carries_status_url_and_body() {
            let (base, server) = serve(vec![(403, r#"{"error":"Not authorized"}"#.to_string())]);

            let err = client(&base).create_draft(&payload()).unwrap_err();
            let requests = server.join().unwrap();

            assert_eq!(requests[0].request_line, "POST /api/v1/drafts HTTP/1.1");
            match err {
                PublishError::Http { status, url, body } => {
                    assert_eq!(status, 403);
                    assert_eq!(url, format!("{base}/api/v1/drafts"));
                    assert_eq!(body, r#"{"error":"Not authorized"}"#);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[test]
        fn draft_endpoints_use_expected_methods_and_paths() {
            let (base, server) = serve(vec![
                (200, r#"{"id":42}"#.to_string()),
                (200, r#"{"id":7,"slug":"seven"}"#.to_string()),
                (200, "{}".to_string()),
                (200, "{}".to_string()),
            ]);

            let api = client(&base);
            assert_eq!(api.user_id().unwrap(), 42);
            let draft = api.update_draft(7, &payload().with_id(7)).unwrap();
            assert_eq!(draft.slug.as_deref(), Some("seven"));
            api.prepublish_draft(7).unwrap();
            api.publish_draft(7, PublishOptions::default()).unwrap();

            let requests = server.join().unwrap();
            let lines: Vec<_> = requests.iter().map(|r| r.request_line.as_str()).collect();
            assert_eq!(
                lines,
                vec![
                    "GET /api/v1/user/profile/self HTTP/1.1",
                    "PUT /api/v1/drafts/7 HTTP/1.1",
                    "GET /api/v1/drafts/7/prepublish HTTP/1.1",
                    "POST /api/v1/drafts/7/publish HTTP/1.1",
                ]
            );

            let update: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
            assert_eq!(update["id"], 7);
            assert_eq!(update["draft_title"], "Title");
            assert_eq!(
                requests[3].body,
                r#"{"send":true,"share_automatically":false}"#
            );
        }
    }
}
