use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::NaiveDate;

use crate::models::{AnalyticsData, Grievance, Priority, Sentiment, Status};

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    pub avg_impact: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentimentDay {
    pub date: NaiveDate,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

pub fn summarize_by_category(grievances: &[Grievance]) -> Vec<CategorySummary> {
    let mut map: BTreeMap<&str, (usize, f64)> = BTreeMap::new();

    for grievance in grievances {
        let entry = map.entry(grievance.category.as_str()).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += grievance.impact_score;
    }

    let mut summaries: Vec<CategorySummary> = map
        .into_iter()
        .map(|(category, (count, total_impact))| CategorySummary {
            category: category.to_string(),
            count,
            avg_impact: if count == 0 { 0.0 } else { total_impact / count as f64 },
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count));
    summaries
}

pub fn sentiment_by_day(grievances: &[Grievance]) -> Vec<SentimentDay> {
    let mut days: BTreeMap<NaiveDate, SentimentDay> = BTreeMap::new();

    for grievance in grievances {
        let date = grievance.created_at.date_naive();
        let day = days.entry(date).or_insert_with(|| SentimentDay {
            date,
            ..SentimentDay::default()
        });
        match grievance.sentiment {
            Sentiment::Positive => day.positive += 1,
            Sentiment::Neutral => day.neutral += 1,
            Sentiment::Negative => day.negative += 1,
        }
    }

    days.into_values().collect()
}

pub fn priority_counts(grievances: &[Grievance]) -> BTreeMap<Priority, usize> {
    let mut counts = BTreeMap::new();
    for grievance in grievances {
        *counts.entry(grievance.priority).or_insert(0) += 1;
    }
    counts
}

/// Unresolved cases, most urgent first: priority level, then impact.
pub fn open_cases_by_urgency(grievances: &[Grievance]) -> Vec<&Grievance> {
    let mut open: Vec<&Grievance> = grievances
        .iter()
        .filter(|grievance| grievance.status != Status::Resolved)
        .collect();
    open.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(b.impact_score.partial_cmp(&a.impact_score).unwrap_or(std::cmp::Ordering::Equal))
    });
    open
}

pub fn render_dashboard(analytics: &AnalyticsData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Total grievances: {}", analytics.total_count);
    let _ = writeln!(output, "Avg satisfaction: {:.1}/5", analytics.avg_rating.unwrap_or(0.0));
    let _ = writeln!(output, "Pending cases: {}", analytics.status_count(Status::Pending));
    let _ = writeln!(output, "Resolution rate: {:.1}%", analytics.resolution_rate());

    if !analytics.status_counts.is_empty() {
        let _ = writeln!(output, "Status:");
        for status in Status::ALL {
            let _ = writeln!(output, "  {:<12} {}", status.as_str(), analytics.status_count(status));
        }
    }
    if !analytics.sentiment_counts.is_empty() {
        let _ = writeln!(output, "Sentiment:");
        for (sentiment, count) in &analytics.sentiment_counts {
            let _ = writeln!(output, "  {:<12} {}", sentiment, count);
        }
    }

    output
}

pub fn build_report(generated_on: NaiveDate, grievances: &[Grievance]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Grievance Analytics Report");
    let _ = writeln!(output, "Generated on {}", generated_on);
    let _ = writeln!(output);

    if grievances.is_empty() {
        let _ = writeln!(output, "No data available for analysis.");
        return output;
    }

    let total = grievances.len();
    let resolved = grievances
        .iter()
        .filter(|grievance| grievance.status == Status::Resolved)
        .count();
    let ratings: Vec<i32> = grievances.iter().filter_map(|grievance| grievance.rating).collect();
    let avg_rating = if ratings.is_empty() {
        0.0
    } else {
        ratings.iter().sum::<i32>() as f64 / ratings.len() as f64
    };

    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Total grievances: {}", total);
    let _ = writeln!(
        output,
        "- Resolution rate: {:.1}%",
        resolved as f64 / total as f64 * 100.0
    );
    let _ = writeln!(output, "- Avg rating: {:.1}/5", avg_rating);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status");
    for status in Status::ALL {
        let count = grievances.iter().filter(|grievance| grievance.status == status).count();
        let _ = writeln!(output, "- {}: {}", status, count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Priority Distribution");
    for (priority, count) in priority_counts(grievances) {
        let _ = writeln!(
            output,
            "- Priority {} ({}): {}",
            priority.level(),
            priority.label(),
            count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Grievances by Category");
    for summary in summarize_by_category(grievances) {
        let _ = writeln!(
            output,
            "- {}: {} grievances (avg impact {:.2})",
            summary.category, summary.count, summary.avg_impact
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sentiment Trends Over Time");
    let _ = writeln!(output, "| Date | Positive | Neutral | Negative |");
    let _ = writeln!(output, "| --- | --- | --- | --- |");
    for day in sentiment_by_day(grievances) {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            day.date, day.positive, day.neutral, day.negative
        );
    }

    let open = open_cases_by_urgency(grievances);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Urgent Open Cases");
    if open.is_empty() {
        let _ = writeln!(output, "No open cases.");
    } else {
        for grievance in open.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} [{}] priority {} impact {:.2} ({})",
                grievance.title,
                grievance.status,
                grievance.priority.level(),
                grievance.impact_score,
                grievance.category
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::Category;

    fn sample(
        title: &str,
        category: Category,
        sentiment: Sentiment,
        priority: Priority,
        status: Status,
        day: u32,
    ) -> Grievance {
        let created_at = Utc.with_ymd_and_hms(2026, 3, day, 9, 30, 0).unwrap();
        Grievance {
            id: Uuid::new_v4(),
            submitter_id: None,
            submitter_name: None,
            title: title.to_string(),
            category,
            description: "details".to_string(),
            sentiment,
            priority,
            compound_score: 0.0,
            impact_score: 0.4,
            status,
            response: None,
            rating: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn samples() -> Vec<Grievance> {
        let mut resolved = sample(
            "Leaky roof",
            Category::Hostel,
            Sentiment::Negative,
            Priority::High,
            Status::Resolved,
            2,
        );
        resolved.rating = Some(4);
        vec![
            resolved,
            sample(
                "Noisy corridor",
                Category::Hostel,
                Sentiment::Negative,
                Priority::Medium,
                Status::InProgress,
                2,
            ),
            sample(
                "Great lab upgrade",
                Category::Infrastructure,
                Sentiment::Positive,
                Priority::Low,
                Status::Pending,
                3,
            ),
        ]
    }

    #[test]
    fn categories_sorted_by_volume() {
        let summaries = summarize_by_category(&samples());
        assert_eq!(summaries[0].category, "Hostel");
        assert_eq!(summaries[0].count, 2);
        assert!((summaries[0].avg_impact - 0.4).abs() < 0.001);
    }

    #[test]
    fn sentiment_grouped_per_day() {
        let days = sentiment_by_day(&samples());
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].negative, 2);
        assert_eq!(days[1].positive, 1);
    }

    #[test]
    fn open_cases_exclude_resolved_and_rank_by_priority() {
        let grievances = samples();
        let open = open_cases_by_urgency(&grievances);
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].title, "Noisy corridor");
    }

    #[test]
    fn report_lists_overview_and_sections() {
        let generated = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let report = build_report(generated, &samples());
        assert!(report.contains("- Total grievances: 3"));
        assert!(report.contains("- Resolution rate: 33.3%"));
        assert!(report.contains("- Avg rating: 4.0/5"));
        assert!(report.contains("- Priority 1 (High): 1"));
        assert!(report.contains("| 2026-03-02 | 0 | 0 | 2 |"));
    }

    #[test]
    fn empty_report_says_so() {
        let generated = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        let report = build_report(generated, &[]);
        assert!(report.contains("No data available for analysis."));
    }

    #[test]
    fn dashboard_shows_rates() {
        let mut analytics = AnalyticsData {
            total_count: 2,
            avg_rating: Some(3.5),
            ..AnalyticsData::default()
        };
        analytics.status_counts.insert("Pending".to_string(), 1);
        analytics.status_counts.insert("Resolved".to_string(), 1);

        let dashboard = render_dashboard(&analytics);
        assert!(dashboard.contains("Avg satisfaction: 3.5/5"));
        assert!(dashboard.contains("Resolution rate: 50.0%"));
        assert!(dashboard.contains("Pending cases: 1"));
    }
}
