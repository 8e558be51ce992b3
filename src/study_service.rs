use chrono::Utc;
use uuid::Uuid;

use crate::database::{Database, LedgerOutcome};
use crate::errors::ApiError;
use crate::ledger;
use crate::models::*;
use crate::{log_service_error, log_service_start, log_service_success};

/// Orchestrates validation, status normalization and ledger mutations between
/// the API surface and the row store.
#[derive(Clone)]
pub struct StudyService {
    db: Database,
    require_data_inicio: bool,
}

impl StudyService {
    pub fn new(db: Database, require_data_inicio: bool) -> Self {
        Self {
            db,
            require_data_inicio,
        }
    }

    fn validate_required_fields(
        &self,
        curso: &str,
        conteudo: &str,
        data_inicio: Option<&chrono::NaiveDate>,
    ) -> Result<(), ApiError> {
        if curso.trim().is_empty() || conteudo.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "curso e conteudo são obrigatórios".to_string(),
            ));
        }
        if self.require_data_inicio && data_inicio.is_none() {
            return Err(ApiError::ValidationError(
                "data_inicio é obrigatória".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create_study(&self, request: CreateStudyRequest) -> Result<StudyItem, ApiError> {
        log_service_start!("study_service", "create_study");
        self.validate_required_fields(
            &request.curso,
            &request.conteudo,
            request.data_inicio.as_ref(),
        )?;

        let item = StudyItem {
            id: Uuid::new_v4(),
            curso: request.curso.trim().to_string(),
            unidade: request.unidade.trim().to_string(),
            conteudo: request.conteudo.trim().to_string(),
            data_inicio: request.data_inicio,
            data_termino: request.data_termino,
            status: StoredStatus::Pendente,
            observacoes: ledger::parse_embedded(request.observacoes.as_deref().unwrap_or("[]")),
            revisoes: ledger::parse_embedded(request.revisoes.as_deref().unwrap_or("[]")),
            questoes: ledger::parse_embedded(request.questoes.as_deref().unwrap_or("[]")),
            created_at: Utc::now(),
        };

        self.db.insert_study(&item).await?;
        log_service_success!(
            "study_service",
            "create_study",
            estudo_id = item.id,
            "study created"
        );
        Ok(item)
    }

    pub async fn get_study(&self, id: Uuid) -> Result<Option<StudyItem>, ApiError> {
        Ok(self.db.get_study(id).await?)
    }

    pub async fn list_studies(&self) -> Result<Vec<StudyItem>, ApiError> {
        Ok(self.db.get_all_studies().await?)
    }

    /// Full replace of the editable fields. The stored status is normalized:
    /// anything other than CONCLUIDO stores as PENDENTE, and ATRASO is left to
    /// the read-time derivation.
    pub async fn update_study(
        &self,
        id: Uuid,
        request: UpdateStudyRequest,
    ) -> Result<Option<StudyItem>, ApiError> {
        log_service_start!("study_service", "update_study", estudo_id = id);
        self.validate_required_fields(
            &request.curso,
            &request.conteudo,
            request.data_inicio.as_ref(),
        )?;

        let Some(mut item) = self.db.get_study(id).await? else {
            return Ok(None);
        };

        item.curso = request.curso.trim().to_string();
        item.unidade = request.unidade.trim().to_string();
        item.conteudo = request.conteudo.trim().to_string();
        item.data_inicio = request.data_inicio;
        item.data_termino = request.data_termino;
        item.status = request.status.unwrap_or(StoredStatus::Pendente);
        if let Some(raw) = request.observacoes.as_deref() {
            item.observacoes = ledger::parse_embedded(raw);
        }
        if let Some(raw) = request.revisoes.as_deref() {
            item.revisoes = ledger::parse_embedded(raw);
        }
        if let Some(raw) = request.questoes.as_deref() {
            item.questoes = ledger::parse_embedded(raw);
        }

        if !self.db.update_study(&item).await? {
            return Ok(None);
        }
        log_service_success!(
            "study_service",
            "update_study",
            estudo_id = id,
            "study replaced"
        );
        Ok(Some(item))
    }

    /// Merge an arbitrary subset of columns into the row.
    pub async fn patch_study(
        &self,
        id: Uuid,
        request: PatchStudyRequest,
    ) -> Result<Option<StudyItem>, ApiError> {
        if request.is_empty() {
            return Err(ApiError::BadRequest("empty patch body".to_string()));
        }

        let Some(mut item) = self.db.get_study(id).await? else {
            return Ok(None);
        };

        if let Some(curso) = request.curso {
            item.curso = curso;
        }
        if let Some(unidade) = request.unidade {
            item.unidade = unidade;
        }
        if let Some(conteudo) = request.conteudo {
            item.conteudo = conteudo;
        }
        if let Some(data_inicio) = request.data_inicio {
            item.data_inicio = Some(data_inicio);
        }
        if let Some(data_termino) = request.data_termino {
            item.data_termino = Some(data_termino);
        }
        if let Some(status) = request.status {
            item.status = status;
        }
        if let Some(raw) = request.observacoes.as_deref() {
            item.observacoes = ledger::parse_embedded(raw);
        }
        if let Some(raw) = request.revisoes.as_deref() {
            item.revisoes = ledger::parse_embedded(raw);
        }
        if let Some(raw) = request.questoes.as_deref() {
            item.questoes = ledger::parse_embedded(raw);
        }

        if item.curso.trim().is_empty() || item.conteudo.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "curso e conteudo são obrigatórios".to_string(),
            ));
        }

        if !self.db.update_study(&item).await? {
            return Ok(None);
        }
        log_service_success!(
            "study_service",
            "patch_study",
            estudo_id = id,
            "study patched"
        );
        Ok(Some(item))
    }

    pub async fn delete_study(&self, id: Uuid) -> Result<bool, ApiError> {
        log_service_start!("study_service", "delete_study", estudo_id = id);
        Ok(self.db.delete_study(id).await?)
    }

    pub async fn schedule_review(
        &self,
        id: Uuid,
        request: ScheduleReviewRequest,
    ) -> Result<Option<StudyItem>, ApiError> {
        let now = Utc::now();
        let outcome = self
            .db
            .mutate_reviews(id, |revisoes| {
                ledger::schedule_review(revisoes, request, now);
                Ok(())
            })
            .await?;
        self.ledger_outcome(outcome, id, "schedule_review")
    }

    pub async fn complete_review(
        &self,
        id: Uuid,
        seq: u32,
    ) -> Result<Option<StudyItem>, ApiError> {
        let now = Utc::now();
        let outcome = self
            .db
            .mutate_reviews(id, |revisoes| ledger::complete_review(revisoes, seq, now))
            .await?;
        self.ledger_outcome(outcome, id, "complete_review")
    }

    pub async fn add_question(
        &self,
        id: Uuid,
        request: AddQuestionRequest,
    ) -> Result<Option<StudyItem>, ApiError> {
        if request.enunciado.trim().is_empty() {
            return Err(ApiError::ValidationError(
                "enunciado é obrigatório".to_string(),
            ));
        }
        match &request.corpo {
            QuestionKind::Objetiva {
                alternativas,
                gabarito,
            } => {
                if alternativas.len() != Letra::ALL.len() {
                    return Err(ApiError::ValidationError(
                        "questão objetiva exige 5 alternativas".to_string(),
                    ));
                }
                if alternativas[gabarito.index()].trim().is_empty() {
                    return Err(ApiError::ValidationError(
                        "preencha a alternativa correta".to_string(),
                    ));
                }
            }
            QuestionKind::Discursiva { gabarito, .. } => {
                if gabarito.trim().is_empty() {
                    return Err(ApiError::ValidationError(
                        "informe a resposta correta".to_string(),
                    ));
                }
            }
        }

        let now = Utc::now();
        let outcome = self
            .db
            .mutate_questions(id, |questoes| {
                ledger::add_question(questoes, request, now);
                Ok(())
            })
            .await?;
        self.ledger_outcome(outcome, id, "add_question")
    }

    pub async fn complete_question(
        &self,
        id: Uuid,
        seq: u32,
    ) -> Result<Option<StudyItem>, ApiError> {
        let now = Utc::now();
        let outcome = self
            .db
            .mutate_questions(id, |questoes| ledger::complete_question(questoes, seq, now))
            .await?;
        self.ledger_outcome(outcome, id, "complete_question")
    }

    pub async fn store_healthy(&self) -> bool {
        self.db.ping().await
    }

    fn ledger_outcome(
        &self,
        outcome: LedgerOutcome,
        id: Uuid,
        operation: &str,
    ) -> Result<Option<StudyItem>, ApiError> {
        match outcome {
            LedgerOutcome::Updated(item) => {
                log_service_success!("study_service", operation, estudo_id = id, "ledger updated");
                Ok(Some(item))
            }
            LedgerOutcome::MissingItem => Ok(None),
            LedgerOutcome::MissingEntry(e) => {
                log_service_error!("study_service", operation, estudo_id = id, error = e);
                Err(e.into())
            }
        }
    }
}
