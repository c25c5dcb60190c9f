// Document adapter - one search index per entity, spoken to over REST
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use crate::config::{RefreshPolicy, SearchConfig};
use crate::models::{self, Entity};
use crate::store::mappings::DocumentMapping;
use crate::store::{check_queryable, new_id, Repository, StoreError};

/// Shared connection settings for every document repository.
#[derive(Debug, Clone)]
pub struct DocumentClient {
    http: reqwest::Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
    index_prefix: String,
    refresh: RefreshPolicy,
    max_results: usize,
}

impl DocumentClient {
    pub fn new(config: &SearchConfig) -> anyhow::Result<Self> {
        let mut base = Url::parse(&config.url)?;
        // Url::join drops the last segment unless the base ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base,
            username: config.username.clone().filter(|u| !u.is_empty()),
            password: config.password.clone().filter(|p| !p.is_empty()),
            index_prefix: config.index_prefix.clone(),
            refresh: config.refresh,
            max_results: config.max_results,
        })
    }

    pub fn index_name(&self, collection: &str) -> String {
        format!("{}{}", self.index_prefix, collection)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| StoreError::Backend(format!("invalid document path {}: {}", path, e)))?;
        let builder = self.http.request(method, url);
        Ok(match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        })
    }

    /// Writes carry the refresh policy so that a read in the same flow sees them.
    fn write_request(&self, method: Method, path: &str) -> Result<RequestBuilder, StoreError> {
        Ok(self
            .request(method, path)?
            .query(&[("refresh", self.refresh.as_str())]))
    }
}

async fn send(builder: RequestBuilder) -> Result<Response, StoreError> {
    builder.send().await.map_err(map_http_error)
}

fn map_http_error(err: reqwest::Error) -> StoreError {
    if err.is_connect() || err.is_timeout() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

async fn backend_error(context: &str, response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return StoreError::Unavailable(format!("{}: {}", context, body));
    }
    StoreError::Backend(format!("{} failed with {}: {}", context, status, body))
}

#[derive(Deserialize)]
struct GetResponse<E> {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<E>,
}

#[derive(Deserialize)]
struct SearchResponse<E> {
    hits: Hits<E>,
}

#[derive(Deserialize)]
struct Hits<E> {
    total: Option<Total>,
    #[serde(default = "Vec::new")]
    hits: Vec<Hit<E>>,
}

#[derive(Deserialize)]
struct Total {
    value: u64,
}

#[derive(Deserialize)]
struct Hit<E> {
    #[serde(rename = "_source")]
    source: E,
}

pub struct DocumentRepository<E> {
    client: DocumentClient,
    index: String,
    ensured: OnceCell<()>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity + DocumentMapping> DocumentRepository<E> {
    pub fn new(client: DocumentClient) -> Self {
        let index = client.index_name(E::COLLECTION);
        Self {
            client,
            index,
            ensured: OnceCell::new(),
            _entity: PhantomData,
        }
    }

    /// Create the index with its mapping the first time this repository writes.
    async fn ensure_index(&self) -> Result<(), StoreError> {
        self.ensured
            .get_or_try_init(|| async {
                let exists = send(self.client.request(Method::HEAD, &self.index)?).await?;
                if exists.status().is_success() {
                    return Ok(());
                }
                if exists.status() != StatusCode::NOT_FOUND {
                    return Err(backend_error("index check", exists).await);
                }

                let created = send(
                    self.client
                        .request(Method::PUT, &self.index)?
                        .json(&E::mapping()),
                )
                .await?;
                if created.status().is_success() {
                    tracing::info!(index = %self.index, "created document index");
                    return Ok(());
                }

                // Another writer may have created it between our check and create
                let status = created.status();
                let body = created.text().await.unwrap_or_default();
                if status == StatusCode::BAD_REQUEST
                    && body.contains("resource_already_exists_exception")
                {
                    return Ok(());
                }
                Err(StoreError::Backend(format!(
                    "index create failed with {}: {}",
                    status, body
                )))
            })
            .await
            .map(|_| ())
    }

    async fn search(&self, body: Value) -> Result<Option<SearchResponse<E>>, StoreError> {
        let path = format!("{}/_search", self.index);
        let response = send(self.client.request(Method::POST, &path)?.json(&body)).await?;

        // A collection nobody has written to yet simply has no matches
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(backend_error("search", response).await);
        }
        let parsed = response
            .json::<SearchResponse<E>>()
            .await
            .map_err(|e| StoreError::Backend(format!("malformed search response: {}", e)))?;
        Ok(Some(parsed))
    }

    /// Newest matches first, at most `max_results` of them.
    async fn term_query(&self, field: &str, value: &str) -> Result<Vec<E>, StoreError> {
        let body = json!({
            "size": self.client.max_results,
            "track_total_hits": true,
            "query": { "term": { field: value } },
            "sort": [{ "created_at": { "order": "desc" } }]
        });
        let Some(response) = self.search(body).await? else {
            return Ok(Vec::new());
        };

        let total = response.hits.total.map(|t| t.value);
        let docs: Vec<E> = response.hits.hits.into_iter().map(|h| h.source).collect();
        if let Some(total) = total.filter(|&t| t > docs.len() as u64) {
            tracing::warn!(
                index = %self.index,
                field,
                total,
                returned = docs.len(),
                "search results truncated at max_results"
            );
        }
        Ok(docs)
    }
}

#[async_trait]
impl<E: Entity + DocumentMapping> Repository<E> for DocumentRepository<E> {
    async fn create(&self, mut entity: E) -> Result<E, StoreError> {
        self.ensure_index().await?;

        if entity.id().is_empty() {
            entity.set_id(new_id());
        }
        let now = models::now();
        entity.set_created_at(now);
        entity.set_updated_at(now);

        let path = format!("{}/_create/{}", self.index, entity.id());
        let response = send(
            self.client
                .write_request(Method::PUT, &path)?
                .json(&entity),
        )
        .await?;

        match response.status() {
            s if s.is_success() => {
                tracing::debug!(index = %self.index, id = entity.id(), "document created");
                Ok(entity)
            }
            StatusCode::CONFLICT => Err(StoreError::DuplicateKey(format!(
                "{} {}",
                E::COLLECTION,
                entity.id()
            ))),
            _ => Err(backend_error("create", response).await),
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<E, StoreError> {
        let path = format!("{}/_doc/{}", self.index, id);
        let response = send(self.client.request(Method::GET, &path)?).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if !response.status().is_success() {
            return Err(backend_error("get", response).await);
        }

        let doc = response
            .json::<GetResponse<E>>()
            .await
            .map_err(|e| StoreError::Backend(format!("malformed document: {}", e)))?;
        match doc.source {
            Some(source) if doc.found => Ok(source),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<E>, StoreError> {
        self.term_query(E::OWNER_FIELD, owner_id).await
    }

    async fn update(&self, mut entity: E) -> Result<E, StoreError> {
        entity.set_updated_at(models::now());

        // Every field is sent, so the partial-update endpoint replaces the whole
        // document while still refusing ids that do not exist
        let path = format!("{}/_update/{}", self.index, entity.id());
        let response = send(
            self.client
                .write_request(Method::POST, &path)?
                .json(&json!({ "doc": &entity })),
        )
        .await?;

        match response.status() {
            s if s.is_success() => Ok(entity),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound),
            StatusCode::CONFLICT => Err(StoreError::Conflict(format!(
                "{} {} was modified concurrently",
                E::COLLECTION,
                entity.id()
            ))),
            _ => Err(backend_error("update", response).await),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = format!("{}/_doc/{}", self.index, id);
        let response = send(self.client.write_request(Method::DELETE, &path)?).await?;

        match response.status() {
            s if s.is_success() => {
                tracing::debug!(index = %self.index, id, "document deleted");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound),
            _ => Err(backend_error("delete", response).await),
        }
    }

    async fn exists_by_field(&self, field: &str, value: &str) -> Result<bool, StoreError> {
        check_queryable::<E>(field)?;
        let body = json!({
            "size": 0,
            "track_total_hits": true,
            "query": { "term": { field: value } }
        });
        Ok(self
            .search(body)
            .await?
            .and_then(|r| r.hits.total)
            .map(|t| t.value > 0)
            .unwrap_or(false))
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<E>, StoreError> {
        check_queryable::<E>(field)?;
        self.term_query(field, value).await
    }
}
