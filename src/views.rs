//! Dashboard counters and render-ready projections over the in-memory
//! collection. Everything here is pure: callers pass `today` explicitly and
//! nothing is cached.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{EffectiveStatus, Question, QuestionStatus, Review, StudyItem};

/// The month/year the dashboard is currently looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRef {
    pub ano: i32,
    pub mes: u32,
}

impl MonthRef {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            ano: date.year(),
            mes: date.month(),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.ano && date.month() == self.mes
    }
}

/// Items are assigned to a month by their start date, falling back to the
/// creation date for rows without one.
fn month_anchor(item: &StudyItem) -> NaiveDate {
    item.data_inicio
        .unwrap_or_else(|| item.created_at.date_naive())
}

pub fn in_month(item: &StudyItem, month: MonthRef) -> bool {
    month.contains(month_anchor(item))
}

/// Criteria of the main table: free text over curso/unidade/conteudo, plus
/// course and effective-status equality.
#[derive(Debug, Clone, Default)]
pub struct StudyFilter {
    pub query: Option<String>,
    pub curso: Option<String>,
    pub status: Option<EffectiveStatus>,
}

pub fn filter_items<'a>(
    items: &'a [StudyItem],
    month: MonthRef,
    filter: &StudyFilter,
    today: NaiveDate,
) -> Vec<&'a StudyItem> {
    let query = filter.query.as_deref().map(str::to_lowercase);
    items
        .iter()
        .filter(|item| in_month(item, month))
        .filter(|item| {
            filter
                .curso
                .as_deref()
                .is_none_or(|curso| item.curso == curso)
        })
        .filter(|item| {
            filter
                .status
                .is_none_or(|status| item.effective_status(today) == status)
        })
        .filter(|item| {
            query.as_deref().is_none_or(|q| {
                format!("{} {} {}", item.curso, item.unidade, item.conteudo)
                    .to_lowercase()
                    .contains(q)
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DashboardCounters {
    pub pendentes: u32,
    pub atrasos: u32,
    pub concluidos: u32,
    pub revisoes_pendentes: u32,
}

/// Counters for the viewed month. All four are month-scoped; a review counts
/// as pending once its scheduled date has arrived and it is not done.
pub fn dashboard_counters(
    items: &[StudyItem],
    month: MonthRef,
    today: NaiveDate,
) -> DashboardCounters {
    let mut counters = DashboardCounters::default();
    for item in items.iter().filter(|item| in_month(item, month)) {
        match item.effective_status(today) {
            EffectiveStatus::Pendente => counters.pendentes += 1,
            EffectiveStatus::Atraso => counters.atrasos += 1,
            EffectiveStatus::Concluido => counters.concluidos += 1,
        }
        counters.revisoes_pendentes += item
            .revisoes
            .iter()
            .filter(|r| !r.feita && r.data <= today)
            .count() as u32;
    }
    counters
}

/// One review flattened with enough of its owner to render a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub estudo_id: Uuid,
    pub curso: String,
    pub conteudo: String,
    pub revisao: Review,
}

fn flatten_reviews(items: &[StudyItem]) -> Vec<ReviewEntry> {
    items
        .iter()
        .flat_map(|item| {
            item.revisoes.iter().map(|r| ReviewEntry {
                estudo_id: item.id,
                curso: item.curso.clone(),
                conteudo: item.conteudo.clone(),
                revisao: r.clone(),
            })
        })
        .collect()
}

/// The "all reviews" view: pending group first, ascending scheduled date
/// within each group.
pub fn all_reviews(items: &[StudyItem]) -> Vec<ReviewEntry> {
    let mut entries = flatten_reviews(items);
    entries.sort_by_key(|e| (e.revisao.feita, e.revisao.data));
    entries
}

/// Reviews that are due and not done, across the whole collection, soonest
/// first. This is the global list behind the review alert.
pub fn pending_reviews(items: &[StudyItem], today: NaiveDate) -> Vec<ReviewEntry> {
    let mut entries: Vec<ReviewEntry> = flatten_reviews(items)
        .into_iter()
        .filter(|e| !e.revisao.feita && e.revisao.data <= today)
        .collect();
    entries.sort_by_key(|e| e.revisao.data);
    entries
}

/// One question flattened with its owner's identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub estudo_id: Uuid,
    pub curso: String,
    pub unidade: String,
    pub conteudo: String,
    pub questao: Question,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub query: Option<String>,
    pub curso: Option<String>,
    pub status: Option<QuestionStatus>,
}

/// The question bank: filtered, PENDENTE group first, then difficulty rank
/// ALTA < MEDIA < BAIXA within each group (objective questions rank last).
pub fn question_bank(items: &[StudyItem], filter: &QuestionFilter) -> Vec<QuestionEntry> {
    let query = filter.query.as_deref().map(str::to_lowercase);
    let mut entries: Vec<QuestionEntry> = items
        .iter()
        .filter(|item| {
            filter
                .curso
                .as_deref()
                .is_none_or(|curso| item.curso == curso)
        })
        .flat_map(|item| {
            item.questoes.iter().map(|q| QuestionEntry {
                estudo_id: item.id,
                curso: item.curso.clone(),
                unidade: item.unidade.clone(),
                conteudo: item.conteudo.clone(),
                questao: q.clone(),
            })
        })
        .filter(|e| filter.status.is_none_or(|status| e.questao.status == status))
        .filter(|e| {
            query.as_deref().is_none_or(|q| {
                format!("{} {} {}", e.questao.enunciado, e.curso, e.conteudo)
                    .to_lowercase()
                    .contains(q)
            })
        })
        .collect();
    entries.sort_by_key(|e| {
        (
            e.questao.status == QuestionStatus::Feita,
            e.questao.corpo.difficulty_rank(),
        )
    });
    entries
}

/// Distinct course names, sorted, for the filter dropdowns.
pub fn course_names(items: &[StudyItem]) -> Vec<String> {
    let mut cursos: Vec<String> = items
        .iter()
        .map(|item| item.curso.clone())
        .filter(|c| !c.is_empty())
        .collect();
    cursos.sort();
    cursos.dedup();
    cursos
}
