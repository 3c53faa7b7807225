use super::AlarmDocumentView;
use crate::document::AlarmDocument;
use crate::error::{ArchiveError, Result};
use crate::model::alarm_type;

/// A set of archived alarms queried for membership at a point in time.
#[derive(Debug, Clone, Default)]
pub struct AlarmTableView {
    alarms: Vec<AlarmDocument>,
}

impl AlarmTableView {
    pub fn new(alarms: Vec<AlarmDocument>) -> Self {
        Self { alarms }
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Alarms created at or before `time` and not yet deleted, oldest first.
    pub fn alarms_at_time(&self, time: i64) -> Vec<&AlarmDocument> {
        let mut alarms: Vec<&AlarmDocument> = self
            .alarms
            .iter()
            .filter(|a| a.first_event_time <= time)
            .filter(|a| a.deleted_time.map_or(true, |deleted| deleted > time))
            .collect();
        alarms.sort_by_key(|a| a.first_event_time);
        alarms
    }

    pub fn problem_alarm_at_time(&self, time: i64) -> Result<AlarmDocumentView<'_>> {
        self.first_alarm_with_type(time, alarm_type::PROBLEM, "problem")
    }

    pub fn resolution_alarm_at_time(&self, time: i64) -> Result<AlarmDocumentView<'_>> {
        self.first_alarm_with_type(time, alarm_type::RESOLUTION, "resolution")
    }

    pub fn situations_at_time(&self, time: i64) -> Vec<&AlarmDocument> {
        self.alarms_at_time(time)
            .into_iter()
            .filter(|a| a.is_situation())
            .collect()
    }

    pub fn situation_at_time(&self, time: i64) -> Option<AlarmDocumentView<'_>> {
        self.situations_at_time(time)
            .into_iter()
            .next()
            .map(|s| AlarmDocumentView::new(s, time))
    }

    fn first_alarm_with_type(
        &self,
        time: i64,
        wanted: i32,
        kind: &'static str,
    ) -> Result<AlarmDocumentView<'_>> {
        self.alarms_at_time(time)
            .into_iter()
            .find(|a| a.alarm_type == Some(wanted))
            .map(|a| AlarmDocumentView::new(a, time))
            .ok_or(ArchiveError::NoAlarmAtTime { kind, time })
    }
}

impl From<Vec<AlarmDocument>> for AlarmTableView {
    fn from(alarms: Vec<AlarmDocument>) -> Self {
        Self::new(alarms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alarm(id: i32, kind: i32, first: i64, deleted: Option<i64>) -> AlarmDocument {
        let mut doc = AlarmDocument::new(id, format!("rk-{id}"), first);
        doc.alarm_type = Some(kind);
        doc.deleted_time = deleted;
        doc
    }

    fn ids(alarms: &[&AlarmDocument]) -> Vec<i32> {
        alarms.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_alarms_at_time_respects_lifetime() {
        let table = AlarmTableView::new(vec![
            alarm(3, alarm_type::PROBLEM, 30, None),
            alarm(1, alarm_type::PROBLEM, 10, Some(20)),
            alarm(2, alarm_type::RESOLUTION, 15, None),
        ]);

        assert!(table.alarms_at_time(5).is_empty());
        assert_eq!(ids(&table.alarms_at_time(10)), vec![1]);
        assert_eq!(ids(&table.alarms_at_time(19)), vec![1, 2]);
        // Deleted exactly at T is gone
        assert_eq!(ids(&table.alarms_at_time(20)), vec![2]);
        assert_eq!(ids(&table.alarms_at_time(40)), vec![2, 3]);
    }

    #[test]
    fn test_problem_and_resolution_lookup() {
        let table = AlarmTableView::new(vec![
            alarm(1, alarm_type::PROBLEM, 10, None),
            alarm(2, alarm_type::RESOLUTION, 20, None),
        ]);

        assert_eq!(table.problem_alarm_at_time(15).unwrap().alarm().id, 1);
        assert_eq!(table.resolution_alarm_at_time(25).unwrap().alarm().id, 2);

        let err = table.resolution_alarm_at_time(15).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::NoAlarmAtTime { kind: "resolution", time: 15 }
        ));
        assert_eq!(err.to_string(), "No resolution alarms at time: 15");
    }

    #[test]
    fn test_situations_empty_is_not_an_error() {
        let mut situation = alarm(5, alarm_type::PROBLEM, 10, None);
        situation.situation = Some(true);
        let table = AlarmTableView::new(vec![alarm(1, alarm_type::PROBLEM, 0, None), situation]);

        assert!(table.situations_at_time(5).is_empty());
        assert!(table.situation_at_time(5).is_none());
        assert_eq!(ids(&table.situations_at_time(10)), vec![5]);
        assert_eq!(table.situation_at_time(10).unwrap().time(), 10);
    }
}
