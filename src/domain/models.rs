use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sort_date: DateTime<Utc>,
}

impl Todo {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "todo.id")?;
        validate_non_empty(&self.title, "todo.title")?;
        if !self.is_completed && self.completed_at.is_some() {
            return Err("todo.completed_at must be empty for an active todo".to_string());
        }
        Ok(())
    }

    /// Completion toggle shared by the app list and the reconciliation path.
    /// Completing stamps `completed_at` and leaves the sort position alone;
    /// reactivating clears it and moves the todo to the bottom of the active
    /// section by resetting `sort_date`.
    pub fn toggle_completion(&mut self, now: DateTime<Utc>) {
        self.is_completed = !self.is_completed;
        if self.is_completed {
            self.completed_at = Some(now);
        } else {
            self.completed_at = None;
            self.sort_date = now;
        }
    }
}

/// Projection of a todo written into the shared widget snapshot. Field names
/// are the cross-process contract and must stay camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WidgetTodo {
    pub id: String,
    pub title: String,
    #[serde(rename = "isCompleted")]
    pub is_completed: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "sortDate")]
    pub sort_date: DateTime<Utc>,
}

impl From<&Todo> for WidgetTodo {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id.clone(),
            title: todo.title.clone(),
            is_completed: todo.is_completed,
            created_at: todo.created_at,
            completed_at: todo.completed_at,
            sort_date: todo.sort_date,
        }
    }
}

/// Field access shared by the canonical todo and its widget projection so
/// both sides sort with the same rule.
pub trait TodoOrdering {
    fn is_completed(&self) -> bool;
    fn created_at(&self) -> DateTime<Utc>;
    fn completed_at(&self) -> Option<DateTime<Utc>>;
    fn sort_date(&self) -> DateTime<Utc>;

    fn effective_completed_at(&self) -> DateTime<Utc> {
        self.completed_at().unwrap_or_else(|| self.created_at())
    }
}

impl TodoOrdering for Todo {
    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn sort_date(&self) -> DateTime<Utc> {
        self.sort_date
    }
}

impl TodoOrdering for WidgetTodo {
    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn sort_date(&self) -> DateTime<Utc> {
        self.sort_date
    }
}

/// Active todos first, oldest sort date leading (new and freshly reactivated
/// items land at the bottom of the active section). Completed todos after,
/// most recent completion leading, falling back to creation time for rows
/// completed before completion stamps existed.
pub fn compare_in_list_order<T: TodoOrdering>(left: &T, right: &T) -> Ordering {
    match (left.is_completed(), right.is_completed()) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => right
            .effective_completed_at()
            .cmp(&left.effective_completed_at()),
        (false, false) => left.sort_date().cmp(&right.sort_date()),
    }
}

/// `sort_by` is stable, so records comparing equal keep their incoming order
/// between refreshes.
pub fn sort_in_list_order<T: TodoOrdering>(items: &mut [T]) {
    items.sort_by(compare_in_list_order);
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitCompletion {
    pub id: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub completions: Vec<HabitCompletion>,
}

impl Habit {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "habit.id")?;
        validate_non_empty(&self.name, "habit.name")?;
        for completion in &self.completions {
            validate_non_empty(&completion.id, "habit.completions[].id")?;
        }
        Ok(())
    }

    /// Completion timestamps bucketed to calendar days in the given timezone.
    /// Several completions on the same day collapse to one.
    pub fn completion_days<T: TimeZone>(&self, timezone: &T) -> BTreeSet<NaiveDate> {
        self.completions
            .iter()
            .map(|completion| completion.date.with_timezone(timezone).date_naive())
            .collect()
    }

    pub fn current_streak<T: TimeZone>(&self, timezone: &T, reference_day: NaiveDate) -> u32 {
        current_streak(&self.completion_days(timezone), reference_day)
    }

    pub fn best_streak<T: TimeZone>(&self, timezone: &T) -> u32 {
        best_streak(&self.completion_days(timezone))
    }

    pub fn completion_stats<T: TimeZone>(
        &self,
        timezone: &T,
        reference_day: NaiveDate,
    ) -> CompletionStats {
        completion_rate(
            &self.completion_days(timezone),
            self.start_date,
            reference_day,
        )
    }

    /// The week ending at `reference_day`, oldest day first, with a completion
    /// flag per day. Feeds the per-habit week row.
    pub fn last_seven_days<T: TimeZone>(
        &self,
        timezone: &T,
        reference_day: NaiveDate,
    ) -> Vec<(NaiveDate, bool)> {
        let days = self.completion_days(timezone);
        let mut week = Vec::with_capacity(7);
        let mut cursor = Some(reference_day);
        for _ in 0..7 {
            let Some(day) = cursor else {
                break;
            };
            week.push((day, days.contains(&day)));
            cursor = day.pred_opt();
        }
        week.reverse();
        week
    }
}

/// Consecutive completed days counted backward from `reference_day`. A
/// reference day without a completion means no streak at all.
pub fn current_streak(days: &BTreeSet<NaiveDate>, reference_day: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut cursor = reference_day;
    while days.contains(&cursor) {
        streak += 1;
        let Some(previous_day) = cursor.pred_opt() else {
            break;
        };
        cursor = previous_day;
    }
    streak
}

/// Longest run of consecutive days anywhere in the set.
pub fn best_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut best = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        run = match previous {
            Some(last) if last.succ_opt() == Some(*day) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        previous = Some(*day);
    }
    best
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CompletionStats {
    pub percent: u32,
    pub count: u32,
    pub total: u32,
}

/// Share of days completed between `start_day` and `reference_day` inclusive.
/// The span is clamped to at least one day. `count` is the number of distinct
/// completion days and is deliberately not clamped to `total`: a start date
/// edited to postdate old completions can push the rate past 100%.
pub fn completion_rate(
    days: &BTreeSet<NaiveDate>,
    start_day: NaiveDate,
    reference_day: NaiveDate,
) -> CompletionStats {
    let span_days = (reference_day - start_day).num_days() + 1;
    let total = span_days.max(1) as u32;
    let count = days.len() as u32;
    CompletionStats {
        percent: count * 100 / total,
        count,
        total,
    }
}

/// Daily focus window. Only the hour/minute components matter; times are kept
/// in the `HH:MM` form they are configured in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FocusSchedule {
    pub start: String,
    pub end: String,
    pub enabled: bool,
}

impl Default for FocusSchedule {
    fn default() -> Self {
        Self {
            start: "09:00".to_string(),
            end: "17:00".to_string(),
            enabled: false,
        }
    }
}

impl FocusSchedule {
    pub fn validate(&self) -> Result<(), String> {
        validate_hhmm(&self.start, "focus.start")?;
        validate_hhmm(&self.end, "focus.end")?;
        Ok(())
    }

    /// Whether the window is open at the given time of day. A window whose end
    /// precedes its start crosses midnight and is open on both sides of it.
    /// Disabled or unparseable schedules are never active.
    pub fn is_active_at(&self, now: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(start) = parse_hhmm(&self.start) else {
            return false;
        };
        let Some(end) = parse_hhmm(&self.end) else {
            return false;
        };

        let start_minutes = minutes_of_day(start);
        let end_minutes = minutes_of_day(end);
        let now_minutes = minutes_of_day(now);

        if end_minutes < start_minutes {
            now_minutes >= start_minutes || now_minutes <= end_minutes
        } else {
            now_minutes >= start_minutes && now_minutes <= end_minutes
        }
    }
}

fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    let mut split = value.split(':');
    let Some(hour_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    let Some(minute_str) = split.next() else {
        return Err(format!("{field_name} must be HH:MM"));
    };
    if split.next().is_some() {
        return Err(format!("{field_name} must be HH:MM"));
    }

    let hour = hour_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    let minute = minute_str
        .parse::<u8>()
        .map_err(|_| format!("{field_name} must be HH:MM"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("{field_name} must be HH:MM"));
    }
    Ok(())
}

fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn day(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn time(value: &str) -> NaiveTime {
        NaiveTime::parse_from_str(value, "%H:%M").expect("valid time")
    }

    fn day_set(values: &[&str]) -> BTreeSet<NaiveDate> {
        values.iter().map(|value| day(value)).collect()
    }

    fn sample_todo(id: &str, created: &str) -> Todo {
        Todo {
            id: id.to_string(),
            title: format!("todo {id}"),
            is_completed: false,
            created_at: fixed_time(created),
            completed_at: None,
            sort_date: fixed_time(created),
        }
    }

    fn completed_todo(id: &str, created: &str, completed: &str) -> Todo {
        let mut todo = sample_todo(id, created);
        todo.is_completed = true;
        todo.completed_at = Some(fixed_time(completed));
        todo
    }

    #[test]
    fn todo_validate_rejects_stale_completion_stamp() {
        let mut todo = sample_todo("todo-1", "2026-03-01T08:00:00Z");
        assert!(todo.validate().is_ok());
        todo.completed_at = Some(fixed_time("2026-03-01T09:00:00Z"));
        assert!(todo.validate().is_err());
    }

    #[test]
    fn toggle_completion_round_trip_updates_metadata() {
        let mut todo = sample_todo("todo-1", "2026-03-01T08:00:00Z");
        let original_sort_date = todo.sort_date;

        let completed_at = fixed_time("2026-03-02T10:00:00Z");
        todo.toggle_completion(completed_at);
        assert!(todo.is_completed);
        assert_eq!(todo.completed_at, Some(completed_at));
        assert_eq!(todo.sort_date, original_sort_date);

        let reactivated_at = fixed_time("2026-03-02T11:00:00Z");
        todo.toggle_completion(reactivated_at);
        assert!(!todo.is_completed);
        assert_eq!(todo.completed_at, None);
        assert_eq!(todo.sort_date, reactivated_at);
    }

    #[test]
    fn list_order_puts_active_before_completed() {
        let mut todos = vec![
            completed_todo("done-old", "2026-03-01T08:00:00Z", "2026-03-01T12:00:00Z"),
            sample_todo("active-new", "2026-03-02T08:00:00Z"),
            completed_todo("done-new", "2026-03-01T09:00:00Z", "2026-03-02T12:00:00Z"),
            sample_todo("active-old", "2026-03-01T07:00:00Z"),
        ];
        sort_in_list_order(&mut todos);

        let ids: Vec<&str> = todos.iter().map(|todo| todo.id.as_str()).collect();
        assert_eq!(ids, vec!["active-old", "active-new", "done-new", "done-old"]);
    }

    #[test]
    fn list_order_falls_back_to_creation_for_unstamped_completions() {
        let mut unstamped = sample_todo("unstamped", "2026-03-02T08:00:00Z");
        unstamped.is_completed = true;
        let stamped = completed_todo("stamped", "2026-03-01T08:00:00Z", "2026-03-01T12:00:00Z");

        let mut todos = vec![stamped, unstamped];
        sort_in_list_order(&mut todos);
        let ids: Vec<&str> = todos.iter().map(|todo| todo.id.as_str()).collect();
        assert_eq!(ids, vec!["unstamped", "stamped"]);
    }

    #[test]
    fn widget_projection_is_lossless() {
        let todo = completed_todo("todo-1", "2026-03-01T08:00:00Z", "2026-03-01T12:00:00Z");
        let record = WidgetTodo::from(&todo);
        assert_eq!(record.id, todo.id);
        assert_eq!(record.title, todo.title);
        assert_eq!(record.is_completed, todo.is_completed);
        assert_eq!(record.created_at, todo.created_at);
        assert_eq!(record.completed_at, todo.completed_at);
        assert_eq!(record.sort_date, todo.sort_date);
    }

    #[test]
    fn widget_record_serializes_with_contract_field_names() {
        let record = WidgetTodo::from(&sample_todo("todo-1", "2026-03-01T08:00:00Z"));
        let encoded = serde_json::to_value(&record).expect("serialize record");

        let object = encoded.as_object().expect("object");
        for field in ["id", "title", "isCompleted", "createdAt", "completedAt", "sortDate"] {
            assert!(object.contains_key(field), "missing field {field}");
        }

        let decoded: WidgetTodo = serde_json::from_value(encoded).expect("deserialize record");
        assert_eq!(decoded, record);
    }

    #[test]
    fn current_streak_counts_consecutive_days() {
        let reference = day("2026-03-10");
        let days = day_set(&["2026-03-10", "2026-03-09", "2026-03-08"]);
        assert_eq!(current_streak(&days, reference), 3);
    }

    #[test]
    fn current_streak_stops_at_first_gap() {
        let reference = day("2026-03-10");
        let days = day_set(&["2026-03-10", "2026-03-07"]);
        assert_eq!(current_streak(&days, reference), 1);
    }

    #[test]
    fn current_streak_is_zero_without_reference_day() {
        let reference = day("2026-03-10");
        assert_eq!(current_streak(&BTreeSet::new(), reference), 0);
        let days = day_set(&["2026-03-09"]);
        assert_eq!(current_streak(&days, reference), 0);
    }

    #[test]
    fn best_streak_finds_longest_run() {
        let days = day_set(&["2026-03-01", "2026-03-02", "2026-03-03", "2026-03-06"]);
        assert_eq!(best_streak(&days), 3);
        assert_eq!(best_streak(&BTreeSet::new()), 0);
    }

    #[test]
    fn completion_rate_spans_inclusive_days() {
        let days = day_set(&["2026-03-05", "2026-03-07", "2026-03-09"]);
        let stats = completion_rate(&days, day("2026-03-05"), day("2026-03-10"));
        assert_eq!(stats.total, 6);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.percent, 50);
    }

    #[test]
    fn completion_rate_clamps_span_but_not_count() {
        let days = day_set(&["2026-03-01", "2026-03-02"]);
        let stats = completion_rate(&days, day("2026-03-10"), day("2026-03-05"));
        assert_eq!(stats.total, 1);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.percent, 200);
    }

    #[test]
    fn habit_completion_days_dedupe_same_day() {
        let habit = Habit {
            id: "hbt-1".to_string(),
            name: "Read".to_string(),
            created_at: fixed_time("2026-03-01T08:00:00Z"),
            start_date: day("2026-03-01"),
            completions: vec![
                HabitCompletion {
                    id: "hc-1".to_string(),
                    date: fixed_time("2026-03-02T06:00:00Z"),
                },
                HabitCompletion {
                    id: "hc-2".to_string(),
                    date: fixed_time("2026-03-02T21:00:00Z"),
                },
            ],
        };

        let days = habit.completion_days(&Utc);
        assert_eq!(days.len(), 1);
        assert!(days.contains(&day("2026-03-02")));
    }

    #[test]
    fn habit_last_seven_days_flags_completions_oldest_first() {
        let habit = Habit {
            id: "hbt-1".to_string(),
            name: "Stretch".to_string(),
            created_at: fixed_time("2026-03-01T08:00:00Z"),
            start_date: day("2026-03-01"),
            completions: vec![
                HabitCompletion {
                    id: "hc-1".to_string(),
                    date: fixed_time("2026-03-10T06:00:00Z"),
                },
                HabitCompletion {
                    id: "hc-2".to_string(),
                    date: fixed_time("2026-03-08T06:00:00Z"),
                },
            ],
        };

        let week = habit.last_seven_days(&Utc, day("2026-03-10"));
        assert_eq!(week.len(), 7);
        assert_eq!(week[0], (day("2026-03-04"), false));
        assert_eq!(week[4], (day("2026-03-08"), true));
        assert_eq!(week[6], (day("2026-03-10"), true));
    }

    #[test]
    fn focus_window_is_inactive_when_disabled() {
        let schedule = FocusSchedule {
            start: "00:00".to_string(),
            end: "23:59".to_string(),
            enabled: false,
        };
        assert!(!schedule.is_active_at(time("12:00")));
    }

    #[test]
    fn focus_window_handles_midnight_crossing() {
        let schedule = FocusSchedule {
            start: "23:00".to_string(),
            end: "01:00".to_string(),
            enabled: true,
        };
        assert!(schedule.is_active_at(time("23:30")));
        assert!(schedule.is_active_at(time("00:30")));
        assert!(!schedule.is_active_at(time("02:00")));
    }

    #[test]
    fn focus_window_bounds_are_inclusive() {
        let schedule = FocusSchedule {
            start: "09:00".to_string(),
            end: "17:00".to_string(),
            enabled: true,
        };
        assert!(schedule.is_active_at(time("09:00")));
        assert!(schedule.is_active_at(time("17:00")));
        assert!(!schedule.is_active_at(time("17:01")));
        assert!(!schedule.is_active_at(time("08:59")));
    }

    #[test]
    fn focus_window_with_equal_bounds_is_a_single_minute() {
        let schedule = FocusSchedule {
            start: "08:00".to_string(),
            end: "08:00".to_string(),
            enabled: true,
        };
        assert!(schedule.is_active_at(time("08:00")));
        assert!(!schedule.is_active_at(time("08:01")));
        assert!(!schedule.is_active_at(time("07:59")));
    }

    #[test]
    fn focus_window_fails_inactive_on_unparseable_times() {
        let schedule = FocusSchedule {
            start: "25:00".to_string(),
            end: "17:00".to_string(),
            enabled: true,
        };
        assert!(!schedule.is_active_at(time("12:00")));
        assert!(schedule.validate().is_err());
    }

    proptest! {
        #[test]
        fn current_streak_never_exceeds_best_streak(
            offsets in proptest::collection::btree_set(0i64..120, 0..40),
            reference_offset in 0i64..120
        ) {
            let base = day("2026-01-01");
            let days: BTreeSet<NaiveDate> = offsets
                .into_iter()
                .map(|offset| base + chrono::Duration::days(offset))
                .collect();
            let reference = base + chrono::Duration::days(reference_offset);

            prop_assert!(current_streak(&days, reference) <= best_streak(&days));
        }
    }

    proptest! {
        #[test]
        fn sorted_todos_partition_active_before_completed(
            seeds in proptest::collection::vec((any::<bool>(), 0i64..10_000, 0i64..10_000), 0..24)
        ) {
            let base = fixed_time("2026-01-01T00:00:00Z");
            let mut todos: Vec<Todo> = seeds
                .iter()
                .enumerate()
                .map(|(index, (is_completed, created_offset, sort_offset))| Todo {
                    id: format!("todo-{index}"),
                    title: format!("todo {index}"),
                    is_completed: *is_completed,
                    created_at: base + chrono::Duration::seconds(*created_offset),
                    completed_at: if *is_completed {
                        Some(base + chrono::Duration::seconds(*sort_offset))
                    } else {
                        None
                    },
                    sort_date: base + chrono::Duration::seconds(*sort_offset),
                })
                .collect();

            sort_in_list_order(&mut todos);

            let first_completed = todos
                .iter()
                .position(|todo| todo.is_completed)
                .unwrap_or(todos.len());
            prop_assert!(todos[first_completed..].iter().all(|todo| todo.is_completed));

            let active = &todos[..first_completed];
            prop_assert!(active.windows(2).all(|pair| pair[0].sort_date <= pair[1].sort_date));

            let completed = &todos[first_completed..];
            prop_assert!(completed
                .windows(2)
                .all(|pair| pair[0].effective_completed_at() >= pair[1].effective_completed_at()));
        }
    }
}
