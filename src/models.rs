use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status as persisted in the `estudos` row. ATRASO is never stored; it is
/// derived at read time from `data_termino` (see `status::effective_status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StoredStatus {
    #[default]
    #[serde(rename = "PENDENTE", alias = "ATRASO")]
    Pendente,
    #[serde(rename = "CONCLUIDO")]
    Concluido,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveStatus {
    #[serde(rename = "PENDENTE")]
    Pendente,
    #[serde(rename = "ATRASO")]
    Atraso,
    #[serde(rename = "CONCLUIDO")]
    Concluido,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyItem {
    pub id: Uuid,
    pub curso: String,
    pub unidade: String,
    pub conteudo: String,
    pub data_inicio: Option<NaiveDate>,
    pub data_termino: Option<NaiveDate>,
    pub status: StoredStatus,
    pub observacoes: Vec<Observation>,
    pub revisoes: Vec<Review>,
    pub questoes: Vec<Question>,
    pub created_at: DateTime<Utc>,
}

impl StudyItem {
    pub fn effective_status(&self, today: NaiveDate) -> EffectiveStatus {
        crate::status::effective_status(self.status, self.data_termino, today)
    }
}

/// Free-text note attached to an item, append-only from the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub texto: String,
    pub data: DateTime<Utc>,
}

/// A scheduled spaced-repetition check-in.
///
/// `seq` is a per-item stable identifier assigned on append; mutations address
/// `(item, seq)` instead of a positional index. Legacy entries without a `seq`
/// deserialize as 0 and get renumbered by the next append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub seq: u32,
    pub data: NaiveDate,
    pub tipo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nota: Option<String>,
    #[serde(default)]
    pub feita: bool,
    pub criada_em: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feita_em: Option<DateTime<Utc>>,
}

/// Human label for the well-known review kinds; free strings pass through.
pub fn review_kind_label(tipo: &str) -> &str {
    match tipo {
        "REVISAO_1" => "1ª Revisão",
        "REVISAO_2" => "2ª Revisão",
        "REVISAO_3" => "3ª Revisão",
        "REVISAO_FINAL" => "Revisão Final",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QuestionStatus {
    #[default]
    #[serde(rename = "PENDENTE")]
    Pendente,
    #[serde(rename = "FEITA")]
    Feita,
}

/// Option letter of an objective question (five alternatives, A through E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Letra {
    A,
    B,
    C,
    D,
    E,
}

impl Letra {
    pub const ALL: [Letra; 5] = [Letra::A, Letra::B, Letra::C, Letra::D, Letra::E];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dificuldade {
    #[serde(rename = "ALTA")]
    Alta,
    #[serde(rename = "MEDIA")]
    Media,
    #[serde(rename = "BAIXA")]
    Baixa,
}

impl Dificuldade {
    /// Sort rank for the question bank: ALTA(0) < MEDIA(1) < BAIXA(2).
    pub fn rank(self) -> u8 {
        match self {
            Dificuldade::Alta => 0,
            Dificuldade::Media => 1,
            Dificuldade::Baixa => 2,
        }
    }
}

/// The two question shapes, discriminated by an explicit `tipo` tag instead of
/// optional fields whose presence implies the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo", rename_all = "lowercase")]
pub enum QuestionKind {
    Objetiva {
        alternativas: Vec<String>,
        gabarito: Letra,
    },
    Discursiva {
        gabarito: String,
        dificuldade: Dificuldade,
    },
}

impl QuestionKind {
    /// Unknown-difficulty shapes (objective questions) rank after BAIXA.
    pub fn difficulty_rank(&self) -> u8 {
        match self {
            QuestionKind::Objetiva { .. } => 3,
            QuestionKind::Discursiva { dificuldade, .. } => dificuldade.rank(),
        }
    }
}

/// A self-test question attached to a study item. Same `seq` addressing rule
/// as `Review`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub seq: u32,
    pub enunciado: String,
    #[serde(default)]
    pub status: QuestionStatus,
    pub criada_em: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feita_em: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub corpo: QuestionKind,
}

// ----------------------------------------------------------------------------
// Request / response DTOs
// ----------------------------------------------------------------------------

/// Body of `POST /api/estudos`. The embedded collections arrive as serialized
/// JSON text, exactly as the row stores them, and are parsed defensively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateStudyRequest {
    #[serde(default)]
    pub curso: String,
    #[serde(default)]
    pub unidade: String,
    #[serde(default)]
    pub conteudo: String,
    #[serde(default)]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub data_termino: Option<NaiveDate>,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub revisoes: Option<String>,
    #[serde(default)]
    pub questoes: Option<String>,
}

/// Body of `PUT /api/estudos/:id`: full replace of the editable fields.
/// Embedded collections left out of the body keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStudyRequest {
    #[serde(default)]
    pub curso: String,
    #[serde(default)]
    pub unidade: String,
    #[serde(default)]
    pub conteudo: String,
    #[serde(default)]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default)]
    pub data_termino: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<StoredStatus>,
    #[serde(default)]
    pub observacoes: Option<String>,
    #[serde(default)]
    pub revisoes: Option<String>,
    #[serde(default)]
    pub questoes: Option<String>,
}

/// Body of `PATCH /api/estudos/:id`: arbitrary subset of columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchStudyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curso: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unidade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conteudo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_inicio: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_termino: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StoredStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observacoes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisoes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questoes: Option<String>,
}

impl PatchStudyRequest {
    pub fn is_empty(&self) -> bool {
        self.curso.is_none()
            && self.unidade.is_none()
            && self.conteudo.is_none()
            && self.data_inicio.is_none()
            && self.data_termino.is_none()
            && self.status.is_none()
            && self.observacoes.is_none()
            && self.revisoes.is_none()
            && self.questoes.is_none()
    }
}

/// Body of `POST /api/estudos/:id/revisoes`. `feita` is forced false and
/// `criada_em` stamped server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleReviewRequest {
    pub data: NaiveDate,
    pub tipo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nota: Option<String>,
}

/// Body of `POST /api/estudos/:id/questoes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddQuestionRequest {
    pub enunciado: String,
    #[serde(flatten)]
    pub corpo: QuestionKind,
}

/// A study item as returned by the API: the stored row plus the view-time
/// status derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyItemView {
    #[serde(flatten)]
    pub item: StudyItem,
    pub status_efetivo: EffectiveStatus,
}

impl StudyItemView {
    pub fn new(item: StudyItem, today: NaiveDate) -> Self {
        let status_efetivo = item.effective_status(today);
        Self {
            item,
            status_efetivo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stored_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&StoredStatus::Pendente).unwrap(),
            "\"PENDENTE\""
        );
        assert_eq!(
            serde_json::to_string(&StoredStatus::Concluido).unwrap(),
            "\"CONCLUIDO\""
        );
        let parsed: StoredStatus = serde_json::from_str("\"CONCLUIDO\"").unwrap();
        assert_eq!(parsed, StoredStatus::Concluido);

        // Clients that still send the derived status get it normalized away.
        let parsed: StoredStatus = serde_json::from_str("\"ATRASO\"").unwrap();
        assert_eq!(parsed, StoredStatus::Pendente);
    }

    #[test]
    fn test_question_kind_tag() {
        let q = Question {
            seq: 1,
            enunciado: "Capital do Brasil?".to_string(),
            status: QuestionStatus::Pendente,
            criada_em: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            feita_em: None,
            corpo: QuestionKind::Objetiva {
                alternativas: vec![
                    "Brasília".into(),
                    "Rio de Janeiro".into(),
                    "São Paulo".into(),
                    "Salvador".into(),
                    "Recife".into(),
                ],
                gabarito: Letra::A,
            },
        };

        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["tipo"], "objetiva");
        assert_eq!(json["gabarito"], "A");

        let back: Question = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn test_discursiva_difficulty_rank() {
        let corpo = QuestionKind::Discursiva {
            gabarito: "Resposta modelo".to_string(),
            dificuldade: Dificuldade::Alta,
        };
        assert_eq!(corpo.difficulty_rank(), 0);

        let objetiva = QuestionKind::Objetiva {
            alternativas: vec![String::new(); 5],
            gabarito: Letra::B,
        };
        assert_eq!(objetiva.difficulty_rank(), 3);
    }

    #[test]
    fn test_review_legacy_entry_without_seq() {
        // Entries written before stable ids existed carry no seq field.
        let raw = r#"{"data":"2024-02-10","tipo":"REVISAO_1","feita":false,"criada_em":"2024-02-01T10:00:00Z"}"#;
        let review: Review = serde_json::from_str(raw).unwrap();
        assert_eq!(review.seq, 0);
        assert!(!review.feita);
        assert!(review.feita_em.is_none());
    }

    #[test]
    fn test_review_kind_labels() {
        assert_eq!(review_kind_label("REVISAO_1"), "1ª Revisão");
        assert_eq!(review_kind_label("REVISAO_FINAL"), "Revisão Final");
        assert_eq!(review_kind_label("livre"), "livre");
    }
}
