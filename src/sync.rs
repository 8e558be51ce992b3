use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::ErrorBody;
use crate::ledger;
use crate::models::*;

/// How often the background loop pulls the server state.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Client-side replica of the study collection.
///
/// Reads come from the local copy. `refresh` replaces it with the server
/// state and writes a cache file so a later offline start still has data.
/// Mutations are optimistic: the local copy changes first and is rolled back
/// if the server rejects or cannot be reached.
pub struct SyncClient {
    http: reqwest::Client,
    base_url: String,
    cache_path: PathBuf,
    items: Vec<StudyItem>,
    online: bool,
}

impl SyncClient {
    pub fn new(base_url: &str, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            cache_path: cache_path.into(),
            items: Vec::new(),
            online: false,
        }
    }

    pub fn items(&self) -> &[StudyItem] {
        &self.items
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Pull the full collection. Never fails: an unreachable server flips the
    /// client offline and falls back to the cache file when the local copy is
    /// still empty.
    pub async fn refresh(&mut self) {
        match self.fetch_all().await {
            Ok(items) => {
                self.items = items;
                self.online = true;
                self.write_cache();
                debug!(count = self.items.len(), "collection refreshed");
            }
            Err(e) => {
                warn!(error = %e, "refresh failed, working offline");
                self.online = false;
                if self.items.is_empty() {
                    self.items = self.read_cache();
                    info!(count = self.items.len(), "loaded cached collection");
                }
            }
        }
    }

    async fn fetch_all(&self) -> Result<Vec<StudyItem>> {
        let views: Vec<StudyItemView> = self
            .http
            .get(self.url("/api/estudos"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(views.into_iter().map(|view| view.item).collect())
    }

    fn write_cache(&self) {
        match serde_json::to_string(&self.items) {
            Ok(payload) => {
                if let Err(e) = std::fs::write(&self.cache_path, payload) {
                    warn!(error = %e, path = %self.cache_path.display(), "cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "cache serialization failed"),
        }
    }

    fn read_cache(&self) -> Vec<StudyItem> {
        let Ok(raw) = std::fs::read_to_string(&self.cache_path) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "cache file unreadable, starting empty");
                Vec::new()
            }
        }
    }

    async fn send_for_item(&self, request: reqwest::RequestBuilder) -> Result<StudyItem> {
        let response = request.send().await.context("request failed")?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            bail!("server rejected request: {message}");
        }
        let view: StudyItemView = response.json().await.context("malformed response body")?;
        Ok(view.item)
    }

    fn position(&self, id: Uuid) -> Result<usize> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .with_context(|| format!("estudo {id} not in local collection"))
    }

    /// Replace the local copy of `id` with the server's row, or roll back to
    /// `previous` when the request failed.
    async fn commit_or_rollback(
        &mut self,
        index: usize,
        previous: StudyItem,
        request: reqwest::RequestBuilder,
    ) -> Result<()> {
        match self.send_for_item(request).await {
            Ok(item) => {
                self.items[index] = item;
                self.online = true;
                self.write_cache();
                Ok(())
            }
            Err(e) => {
                self.items[index] = previous;
                self.online = false;
                Err(e)
            }
        }
    }

    pub async fn create_study(&mut self, request: CreateStudyRequest) -> Result<StudyItem> {
        let builder = self.http.post(self.url("/api/estudos")).json(&request);
        let item = self.send_for_item(builder).await?;
        self.items.insert(0, item.clone());
        self.online = true;
        self.write_cache();
        Ok(item)
    }

    pub async fn update_study(&mut self, id: Uuid, request: UpdateStudyRequest) -> Result<()> {
        let index = self.position(id)?;
        let previous = self.items[index].clone();

        let mut local = previous.clone();
        local.curso = request.curso.clone();
        local.unidade = request.unidade.clone();
        local.conteudo = request.conteudo.clone();
        local.data_inicio = request.data_inicio;
        local.data_termino = request.data_termino;
        local.status = request.status.unwrap_or(StoredStatus::Pendente);
        self.items[index] = local;

        let builder = self
            .http
            .put(self.url(&format!("/api/estudos/{id}")))
            .json(&request);
        self.commit_or_rollback(index, previous, builder).await
    }

    pub async fn set_status(&mut self, id: Uuid, status: StoredStatus) -> Result<()> {
        let index = self.position(id)?;
        let previous = self.items[index].clone();
        self.items[index].status = status;

        let builder = self
            .http
            .patch(self.url(&format!("/api/estudos/{id}")))
            .json(&PatchStudyRequest {
                status: Some(status),
                ..Default::default()
            });
        self.commit_or_rollback(index, previous, builder).await
    }

    pub async fn delete_study(&mut self, id: Uuid) -> Result<()> {
        let index = self.position(id)?;
        let previous = self.items.remove(index);

        let response = self
            .http
            .delete(self.url(&format!("/api/estudos/{id}")))
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => {
                self.online = true;
                self.write_cache();
                Ok(())
            }
            Ok(response) => {
                let status = response.status();
                self.items.insert(index, previous);
                self.online = false;
                bail!("server rejected delete: {status}");
            }
            Err(e) => {
                self.items.insert(index, previous);
                self.online = false;
                Err(e.into())
            }
        }
    }

    pub async fn schedule_review(&mut self, id: Uuid, request: ScheduleReviewRequest) -> Result<()> {
        let index = self.position(id)?;
        let previous = self.items[index].clone();
        ledger::schedule_review(&mut self.items[index].revisoes, request.clone(), Utc::now());

        let builder = self
            .http
            .post(self.url(&format!("/api/estudos/{id}/revisoes")))
            .json(&request);
        self.commit_or_rollback(index, previous, builder).await
    }

    pub async fn complete_review(&mut self, id: Uuid, seq: u32) -> Result<()> {
        let index = self.position(id)?;
        let previous = self.items[index].clone();
        ledger::complete_review(&mut self.items[index].revisoes, seq, Utc::now())
            .with_context(|| format!("revisão {seq} not in local collection"))?;

        let builder = self
            .http
            .post(self.url(&format!("/api/estudos/{id}/revisoes/{seq}/feita")));
        self.commit_or_rollback(index, previous, builder).await
    }

    pub async fn add_question(&mut self, id: Uuid, request: AddQuestionRequest) -> Result<()> {
        let index = self.position(id)?;
        let previous = self.items[index].clone();
        ledger::add_question(&mut self.items[index].questoes, request.clone(), Utc::now());

        let builder = self
            .http
            .post(self.url(&format!("/api/estudos/{id}/questoes")))
            .json(&request);
        self.commit_or_rollback(index, previous, builder).await
    }

    pub async fn complete_question(&mut self, id: Uuid, seq: u32) -> Result<()> {
        let index = self.position(id)?;
        let previous = self.items[index].clone();
        ledger::complete_question(&mut self.items[index].questoes, seq, Utc::now())
            .with_context(|| format!("questão {seq} not in local collection"))?;

        let builder = self
            .http
            .post(self.url(&format!("/api/estudos/{id}/questoes/{seq}/feita")));
        self.commit_or_rollback(index, previous, builder).await
    }

    /// Effective status of a local item against the local clock.
    pub fn effective_status(&self, id: Uuid) -> Option<EffectiveStatus> {
        let today = Local::now().date_naive();
        self.items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.effective_status(today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_start_without_cache_is_empty() {
        let client = SyncClient::new("http://127.0.0.1:1", "/nonexistent/cache.json");
        assert!(client.items().is_empty());
        assert!(!client.is_online());
        assert!(client.read_cache().is_empty());
    }

    #[test]
    fn test_corrupt_cache_degrades_to_empty() {
        let dir = std::env::temp_dir().join(format!("jornada-sync-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let client = SyncClient::new("http://127.0.0.1:1", &path);
        assert!(client.read_cache().is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = std::env::temp_dir().join(format!("jornada-sync-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cache.json");

        let mut client = SyncClient::new("http://127.0.0.1:1", &path);
        client.items = vec![StudyItem {
            id: Uuid::new_v4(),
            curso: "Cálculo".to_string(),
            unidade: String::new(),
            conteudo: "Limites".to_string(),
            data_inicio: None,
            data_termino: None,
            status: StoredStatus::Pendente,
            observacoes: Vec::new(),
            revisoes: Vec::new(),
            questoes: Vec::new(),
            created_at: Utc::now(),
        }];
        client.write_cache();

        let restored = SyncClient::new("http://127.0.0.1:1", &path).read_cache();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].curso, "Cálculo");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
