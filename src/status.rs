use chrono::NaiveDate;

use crate::models::{EffectiveStatus, StoredStatus};

/// Derive the status a study item should display for a given day.
///
/// CONCLUIDO is sticky: once stored, the due date is irrelevant until an
/// explicit reopen resets the stored status to PENDENTE. Otherwise an item is
/// ATRASO exactly when its due date is strictly before `today` (date-only
/// comparison). ATRASO is never written back; callers recompute on every read.
pub fn effective_status(
    stored: StoredStatus,
    data_termino: Option<NaiveDate>,
    today: NaiveDate,
) -> EffectiveStatus {
    match stored {
        StoredStatus::Concluido => EffectiveStatus::Concluido,
        StoredStatus::Pendente => match data_termino {
            Some(termino) if termino < today => EffectiveStatus::Atraso,
            _ => EffectiveStatus::Pendente,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_concluido_is_sticky_regardless_of_due_date() {
        let today = date(2024, 6, 1);
        let overdue = Some(date(2024, 1, 1));
        assert_eq!(
            effective_status(StoredStatus::Concluido, overdue, today),
            EffectiveStatus::Concluido
        );
        assert_eq!(
            effective_status(StoredStatus::Concluido, None, today),
            EffectiveStatus::Concluido
        );
    }

    #[test]
    fn test_pendente_past_due_is_atraso() {
        let today = date(2024, 6, 1);
        assert_eq!(
            effective_status(StoredStatus::Pendente, Some(date(2024, 1, 1)), today),
            EffectiveStatus::Atraso
        );
    }

    #[test]
    fn test_pendente_without_due_date_stays_pendente() {
        let today = date(2024, 6, 1);
        assert_eq!(
            effective_status(StoredStatus::Pendente, None, today),
            EffectiveStatus::Pendente
        );
    }

    #[test]
    fn test_due_today_is_not_atraso() {
        // Strictly-before comparison: the due day itself is still on time.
        let today = date(2024, 6, 1);
        assert_eq!(
            effective_status(StoredStatus::Pendente, Some(today), today),
            EffectiveStatus::Pendente
        );
        assert_eq!(
            effective_status(StoredStatus::Pendente, Some(date(2024, 6, 2)), today),
            EffectiveStatus::Pendente
        );
    }

    #[test]
    fn test_one_day_late_is_atraso() {
        let today = date(2024, 6, 1);
        assert_eq!(
            effective_status(StoredStatus::Pendente, Some(date(2024, 5, 31)), today),
            EffectiveStatus::Atraso
        );
    }
}
