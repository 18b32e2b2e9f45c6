use time::Date;

use super::TimelineEntry;

/// 1-based day of the hike on which `occurs_on` falls. Days before the
/// start come out as zero or negative.
pub fn day_number(start: Date, occurs_on: Date) -> i64 {
    (occurs_on - start).whole_days() + 1
}

/// Labels every entry in grid order.
///
/// Consecutive entries sharing a day number form a run. A lone entry reads
/// `Day N`; entries inside a longer run read `Day N–k`, where `k` is the
/// entry's 1-based position within the run.
pub fn day_labels(entries: &[TimelineEntry], start: Date) -> Vec<String> {
    let days: Vec<i64> = entries
        .iter()
        .map(|entry| day_number(start, entry.occurs_on()))
        .collect();

    let mut labels = Vec::with_capacity(days.len());
    let mut run_start = 0;
    while run_start < days.len() {
        let day = days[run_start];
        let run_len = days[run_start..]
            .iter()
            .take_while(|candidate| **candidate == day)
            .count();
        if run_len == 1 {
            labels.push(format!("Day {day}"));
        } else {
            labels.extend((1..=run_len).map(|ordinal| format!("Day {day}–{ordinal}")));
        }
        run_start += run_len;
    }
    labels
}

/// Label for the entry at `index`, or `None` when out of range.
pub fn day_label_for(entries: &[TimelineEntry], start: Date, index: usize) -> Option<String> {
    let entry = entries.get(index)?;
    let day = day_number(start, entry.occurs_on());
    let same_day = |idx: &usize| day_number(start, entries[*idx].occurs_on()) == day;

    let first = (0..index).rev().take_while(same_day).last().unwrap_or(index);
    let last = (index + 1..entries.len())
        .take_while(same_day)
        .last()
        .unwrap_or(index);

    if first == last {
        Some(format!("Day {day}"))
    } else {
        Some(format!("Day {day}–{}", index - first + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn entry(id: &str, day: Date) -> TimelineEntry {
        TimelineEntry::new(id, day)
    }

    #[test]
    fn single_entry_days_are_plain() {
        let start = date!(2024 - 07 - 10);
        let entries = vec![
            entry("1", date!(2024 - 07 - 10)),
            entry("2", date!(2024 - 07 - 11)),
            entry("3", date!(2024 - 07 - 14)),
        ];
        assert_eq!(day_labels(&entries, start), vec!["Day 1", "Day 2", "Day 5"]);
    }

    #[test]
    fn shared_days_are_suffixed_by_ordinal() {
        let start = date!(2024 - 07 - 10);
        let entries = vec![
            entry("1", date!(2024 - 07 - 10)),
            entry("2", date!(2024 - 07 - 13)),
            entry("3", date!(2024 - 07 - 13)),
            entry("4", date!(2024 - 07 - 13)),
            entry("5", date!(2024 - 07 - 14)),
        ];
        let labels = day_labels(&entries, start);
        assert_eq!(labels, vec!["Day 1", "Day 4–1", "Day 4–2", "Day 4–3", "Day 5"]);
        for (idx, expected) in labels.iter().enumerate() {
            assert_eq!(day_label_for(&entries, start, idx).as_deref(), Some(expected.as_str()));
        }
        assert_eq!(day_label_for(&entries, start, 5), None);
    }

    #[test]
    fn entries_before_start_are_not_clamped() {
        let start = date!(2024 - 07 - 10);
        let entries = vec![entry("early", date!(2024 - 07 - 09))];
        assert_eq!(day_labels(&entries, start), vec!["Day 0"]);
    }
}
