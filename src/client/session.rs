//! Client session: explicit state and a message-shaped request surface.
//!
//! One [`Session`] owns the API client and the cache handle; every client
//! action arrives as a [`Request`] and produces exactly one [`Response`].
//! API failures degrade toward the cache (the reading list keeps working
//! offline); cache failures are reported, never swallowed.

use secrecy::SecretString;

use super::api::ApiClient;
use super::cache::FileCache;
use crate::capture::{capture_article, CapturedPage};
use crate::model::{Article, LocalArticle, ScrollPosition};

/// Client actions, one variant per message the surface can send.
#[derive(Debug, Clone)]
pub enum Request {
    /// Save the page currently in front of the reader.
    SaveArticle(CapturedPage),
    /// Fetch the reading list: server copy when reachable, cache otherwise.
    GetArticles,
    /// Reconcile the cached list with the server and adopt the result.
    Sync,
    SetToken(String),
    ClearToken,
    /// Persist where the reader is in an article.
    RecordProgress {
        url: String,
        scroll_position: ScrollPosition,
        progress_percent: u8,
    },
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Saved {
        article: LocalArticle,
        /// True when the article only reached the cache (no token, so the
        /// copy waits for the next sync).
        local_only: bool,
    },
    Articles(Vec<LocalArticle>),
    Synced(Vec<LocalArticle>),
    Ack,
    Failed(String),
}

/// Explicit client state: token, cache handle, API client.
pub struct Session {
    api: ApiClient,
    cache: FileCache,
}

impl Session {
    /// Wires a session together, adopting any token the cache carries from a
    /// previous run.
    pub fn new(mut api: ApiClient, cache: FileCache) -> Self {
        if let Some(token) = cache.token() {
            api.set_token(Some(SecretString::from(token.to_string())));
        }
        Self { api, cache }
    }

    /// Handles one request. Every request kind has exactly one handler arm.
    pub async fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::SaveArticle(page) => self.save_article(page).await,
            Request::GetArticles => self.get_articles().await,
            Request::Sync => self.sync().await,
            Request::SetToken(token) => self.set_token(token),
            Request::ClearToken => self.clear_token(),
            Request::RecordProgress {
                url,
                scroll_position,
                progress_percent,
            } => {
                self.record_progress(url, scroll_position, progress_percent)
                    .await
            }
        }
    }

    async fn save_article(&mut self, page: CapturedPage) -> Response {
        let article = match capture_article(&page) {
            Ok(article) => article,
            Err(e) => return Response::Failed(e.to_string()),
        };

        if self.api.has_token() {
            // The server's copy wins: it carries the assigned id and
            // updatedAt the next sync comparison will need.
            let saved = self.api.save_article(&article).await;
            return match saved {
                Ok(server_copy) => {
                    let server_copy = server_copy.into_local();
                    match self.cache.upsert_local(server_copy.clone()) {
                        Ok(()) => Response::Saved {
                            article: server_copy,
                            local_only: false,
                        },
                        Err(e) => Response::Failed(e.to_string()),
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %article.url, error = %e, "Failed to save article to server");
                    Response::Failed(e.to_string())
                }
            };
        }

        match self.cache.upsert_local(article.clone()) {
            Ok(()) => Response::Saved {
                article,
                local_only: true,
            },
            Err(e) => Response::Failed(e.to_string()),
        }
    }

    async fn get_articles(&mut self) -> Response {
        if self.api.has_token() {
            let fetched = self.api.fetch_articles().await;
            match fetched {
                Ok(articles) => {
                    let articles: Vec<LocalArticle> =
                        articles.into_iter().map(Article::into_local).collect();
                    return match self.cache.replace_articles(articles.clone()) {
                        Ok(()) => Response::Articles(articles),
                        Err(e) => Response::Failed(e.to_string()),
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Fetch failed, serving cached articles");
                }
            }
        }

        Response::Articles(self.cache.articles().to_vec())
    }

    async fn sync(&mut self) -> Response {
        if !self.api.has_token() {
            return Response::Failed("not authenticated".to_string());
        }

        if self.cache.articles().is_empty() {
            // Nothing local to offer; just adopt the server list.
            let fetched = self.api.fetch_articles().await;
            return match fetched {
                Ok(articles) => {
                    let articles: Vec<LocalArticle> =
                        articles.into_iter().map(Article::into_local).collect();
                    match self.cache.replace_articles(articles.clone()) {
                        Ok(()) => Response::Synced(articles),
                        Err(e) => Response::Failed(e.to_string()),
                    }
                }
                Err(e) => Response::Failed(e.to_string()),
            };
        }

        let synced = self.api.sync(self.cache.articles()).await;
        match synced {
            Ok(merged) => match self.cache.replace_articles(merged.clone()) {
                Ok(()) => Response::Synced(merged),
                Err(e) => Response::Failed(e.to_string()),
            },
            Err(e) => {
                // Cache untouched; the next sync retries from the same state.
                tracing::warn!(error = %e, retryable = e.is_retryable(), "Sync failed");
                Response::Failed(e.to_string())
            }
        }
    }

    fn set_token(&mut self, token: String) -> Response {
        if let Err(e) = self.cache.set_token(token.clone()) {
            return Response::Failed(e.to_string());
        }
        self.api.set_token(Some(SecretString::from(token)));
        Response::Ack
    }

    fn clear_token(&mut self) -> Response {
        if let Err(e) = self.cache.clear_token() {
            return Response::Failed(e.to_string());
        }
        self.api.set_token(None);
        Response::Ack
    }

    async fn record_progress(
        &mut self,
        url: String,
        scroll_position: ScrollPosition,
        progress_percent: u8,
    ) -> Response {
        let Some(cached) = self.cache.articles().iter().find(|a| a.url == url) else {
            return Response::Failed(format!("article not in cache: {}", url));
        };

        let mut updated = cached.clone();
        updated.scroll_position = Some(scroll_position);
        updated.progress_percent = progress_percent.min(100);

        if let Err(e) = self.cache.upsert_local(updated.clone()) {
            return Response::Failed(e.to_string());
        }

        // Best effort towards the server; the local write already stands.
        if self.api.has_token() {
            if let Some(id) = updated.id {
                let pushed = self
                    .api
                    .update_progress(id, updated.scroll_position.as_ref(), updated.progress_percent)
                    .await;
                if let Err(e) = pushed {
                    tracing::warn!(article_id = id, error = %e, "Progress update failed on server");
                }
            }
        }

        Response::Ack
    }
}
