use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::models::{
    AddQuestionRequest, Question, QuestionStatus, Review, ScheduleReviewRequest,
};

/// Errors raised by ledger mutations addressed at a missing entry.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("review with seq {0} not found")]
    ReviewNotFound(u32),

    #[error("question with seq {0} not found")]
    QuestionNotFound(u32),
}

/// Parse an embedded collection column. Malformed or empty text degrades to an
/// empty collection instead of failing the whole row.
pub fn parse_embedded<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(error = %e, "malformed embedded collection, treating as empty");
            Vec::new()
        }
    }
}

pub fn serialize_embedded<T: Serialize>(entries: &[T]) -> anyhow::Result<String> {
    Ok(serde_json::to_string(entries)?)
}

trait SeqEntry {
    fn seq(&self) -> u32;
    fn set_seq(&mut self, seq: u32);
}

impl SeqEntry for Review {
    fn seq(&self) -> u32 {
        self.seq
    }
    fn set_seq(&mut self, seq: u32) {
        self.seq = seq;
    }
}

impl SeqEntry for Question {
    fn seq(&self) -> u32 {
        self.seq
    }
    fn set_seq(&mut self, seq: u32) {
        self.seq = seq;
    }
}

/// Next stable per-item id. Entries written before ids existed (seq 0) or with
/// duplicated ids are renumbered in order first, so appends stay unambiguous.
fn next_seq<T: SeqEntry>(entries: &mut [T]) -> u32 {
    let needs_renumber = entries.iter().any(|e| e.seq() == 0)
        || (1..entries.len())
            .any(|i| entries[..i].iter().any(|e| e.seq() == entries[i].seq()));
    if needs_renumber {
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.set_seq((i + 1) as u32);
        }
    }
    entries.iter().map(SeqEntry::seq).max().unwrap_or(0) + 1
}

/// Append a scheduled review. `feita` is forced false and `criada_em` stamped
/// here; existing entries are never removed or reordered.
pub fn schedule_review(
    revisoes: &mut Vec<Review>,
    request: ScheduleReviewRequest,
    now: DateTime<Utc>,
) -> u32 {
    let seq = next_seq(revisoes);
    revisoes.push(Review {
        seq,
        data: request.data,
        tipo: request.tipo,
        nota: request.nota.filter(|n| !n.trim().is_empty()),
        feita: false,
        criada_em: now,
        feita_em: None,
    });
    seq
}

/// Mark a review done. Completion never reverts; completing twice just
/// refreshes `feita_em`.
pub fn complete_review(
    revisoes: &mut [Review],
    seq: u32,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let review = revisoes
        .iter_mut()
        .find(|r| r.seq == seq)
        .ok_or(LedgerError::ReviewNotFound(seq))?;
    review.feita = true;
    review.feita_em = Some(now);
    Ok(())
}

/// Append a question in PENDENTE state.
pub fn add_question(
    questoes: &mut Vec<Question>,
    request: AddQuestionRequest,
    now: DateTime<Utc>,
) -> u32 {
    let seq = next_seq(questoes);
    questoes.push(Question {
        seq,
        enunciado: request.enunciado,
        status: QuestionStatus::Pendente,
        criada_em: now,
        feita_em: None,
        corpo: request.corpo,
    });
    seq
}

/// Mark a question done; same contract as `complete_review`.
pub fn complete_question(
    questoes: &mut [Question],
    seq: u32,
    now: DateTime<Utc>,
) -> Result<(), LedgerError> {
    let question = questoes
        .iter_mut()
        .find(|q| q.seq == seq)
        .ok_or(LedgerError::QuestionNotFound(seq))?;
    question.status = QuestionStatus::Feita;
    question.feita_em = Some(now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dificuldade, QuestionKind};
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn instant(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, 0, 0).unwrap()
    }

    fn review_request(d: NaiveDate) -> ScheduleReviewRequest {
        ScheduleReviewRequest {
            data: d,
            tipo: "REVISAO_1".to_string(),
            nota: None,
        }
    }

    #[test]
    fn test_schedule_review_appends_with_forced_defaults() {
        let mut revisoes = Vec::new();
        let seq = schedule_review(&mut revisoes, review_request(date(2024, 3, 10)), instant(9));

        assert_eq!(revisoes.len(), 1);
        assert_eq!(seq, 1);
        assert!(!revisoes[0].feita);
        assert_eq!(revisoes[0].criada_em, instant(9));
        assert!(revisoes[0].feita_em.is_none());
    }

    #[test]
    fn test_schedule_review_never_reorders_existing_entries() {
        let mut revisoes = Vec::new();
        schedule_review(&mut revisoes, review_request(date(2024, 3, 10)), instant(9));
        schedule_review(&mut revisoes, review_request(date(2024, 2, 1)), instant(10));
        let before: Vec<u32> = revisoes.iter().map(|r| r.seq).collect();

        schedule_review(&mut revisoes, review_request(date(2024, 1, 1)), instant(11));

        assert_eq!(revisoes.len(), 3);
        let after: Vec<u32> = revisoes.iter().take(2).map(|r| r.seq).collect();
        assert_eq!(before, after);
        assert_eq!(revisoes[2].seq, 3);
    }

    #[test]
    fn test_complete_review_is_idempotent_on_feita() {
        let mut revisoes = Vec::new();
        let seq = schedule_review(&mut revisoes, review_request(date(2024, 3, 10)), instant(9));

        complete_review(&mut revisoes, seq, instant(10)).unwrap();
        assert!(revisoes[0].feita);
        assert_eq!(revisoes[0].feita_em, Some(instant(10)));

        // Second completion keeps feita true and only moves the stamp.
        complete_review(&mut revisoes, seq, instant(11)).unwrap();
        assert!(revisoes[0].feita);
        assert_eq!(revisoes[0].feita_em, Some(instant(11)));
    }

    #[test]
    fn test_complete_review_unknown_seq_is_not_found() {
        let mut revisoes = Vec::new();
        schedule_review(&mut revisoes, review_request(date(2024, 3, 10)), instant(9));

        let err = complete_review(&mut revisoes, 99, instant(10)).unwrap_err();
        assert_eq!(err, LedgerError::ReviewNotFound(99));
        assert!(!revisoes[0].feita);
    }

    #[test]
    fn test_append_renumbers_legacy_entries_without_seq() {
        let raw = r#"[
            {"data":"2024-01-05","tipo":"REVISAO_1","feita":true,"criada_em":"2024-01-01T08:00:00Z","feita_em":"2024-01-05T08:00:00Z"},
            {"data":"2024-01-12","tipo":"REVISAO_2","feita":false,"criada_em":"2024-01-01T08:00:00Z"}
        ]"#;
        let mut revisoes: Vec<Review> = parse_embedded(raw);
        assert!(revisoes.iter().all(|r| r.seq == 0));

        let seq = schedule_review(&mut revisoes, review_request(date(2024, 2, 1)), instant(9));

        assert_eq!(revisoes[0].seq, 1);
        assert_eq!(revisoes[1].seq, 2);
        assert_eq!(seq, 3);
        // Renumbering keeps the original order and flags.
        assert!(revisoes[0].feita);
        assert!(!revisoes[1].feita);
    }

    #[test]
    fn test_question_lifecycle() {
        let mut questoes = Vec::new();
        let seq = add_question(
            &mut questoes,
            AddQuestionRequest {
                enunciado: "Defina escopo léxico.".to_string(),
                corpo: QuestionKind::Discursiva {
                    gabarito: "Resolução de nomes no ponto de definição.".to_string(),
                    dificuldade: Dificuldade::Media,
                },
            },
            instant(9),
        );

        assert_eq!(questoes[0].status, QuestionStatus::Pendente);
        complete_question(&mut questoes, seq, instant(10)).unwrap();
        assert_eq!(questoes[0].status, QuestionStatus::Feita);
        assert_eq!(questoes[0].feita_em, Some(instant(10)));

        let err = complete_question(&mut questoes, 42, instant(11)).unwrap_err();
        assert_eq!(err, LedgerError::QuestionNotFound(42));
    }

    #[test]
    fn test_embedded_round_trip_is_deep_equal() {
        let mut revisoes = Vec::new();
        schedule_review(&mut revisoes, review_request(date(2024, 3, 10)), instant(9));
        schedule_review(
            &mut revisoes,
            ScheduleReviewRequest {
                data: date(2024, 4, 1),
                tipo: "REVISAO_FINAL".to_string(),
                nota: Some("revisar capítulo 4".to_string()),
            },
            instant(10),
        );
        complete_review(&mut revisoes, 1, instant(11)).unwrap();

        let raw = serialize_embedded(&revisoes).unwrap();
        let back: Vec<Review> = parse_embedded(&raw);
        assert_eq!(back, revisoes);
    }

    #[test]
    fn test_malformed_embedded_text_degrades_to_empty() {
        let reviews: Vec<Review> = parse_embedded("{ not json");
        assert!(reviews.is_empty());

        let reviews: Vec<Review> = parse_embedded("");
        assert!(reviews.is_empty());

        // Valid JSON of the wrong shape is also treated as empty.
        let reviews: Vec<Review> = parse_embedded("{\"a\":1}");
        assert!(reviews.is_empty());
    }
}
