//! Dashboard aggregates over a user's persisted sentiments.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::records::SentimentRecord;

/// Tie-break order for the prevailing sentiment.
const PREVAILING_ORDER: &[&str] = &["positive", "neutral", "negative"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
    /// Share of the non-null values of this field, 0-100, two decimals.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SarcasmStats {
    /// Records where sarcasm was determined at all.
    pub total: usize,
    pub sarcastic: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub sentiment: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentStats {
    pub total: usize,
    pub distribution: Vec<LabelCount>,
    pub average_sentiment_value: Option<f64>,
    pub emotions: Vec<LabelCount>,
    pub tone_breakdown: Vec<LabelCount>,
    pub impact_breakdown: Vec<LabelCount>,
    pub sarcasm: SarcasmStats,
    pub prevailing_sentiment: Option<String>,
}

impl SentimentStats {
    pub fn from_records(records: &[SentimentRecord]) -> Self {
        let distribution = breakdown(records.iter().map(|r| Some(r.sentiment.as_str())));

        let values: Vec<f64> = records.iter().filter_map(|r| r.sentiment_value).collect();
        let average_sentiment_value = if values.is_empty() {
            None
        } else {
            Some(round2(values.iter().sum::<f64>() / values.len() as f64))
        };

        let judged: Vec<bool> = records.iter().filter_map(|r| r.sarcasm).collect();
        let sarcastic = judged.iter().filter(|s| **s).count();

        Self {
            total: records.len(),
            prevailing_sentiment: prevailing(&distribution),
            distribution,
            average_sentiment_value,
            emotions: breakdown(records.iter().map(|r| r.emotion.as_deref())),
            tone_breakdown: breakdown(records.iter().map(|r| r.tone.as_deref())),
            impact_breakdown: breakdown(records.iter().map(|r| r.impact.as_deref())),
            sarcasm: SarcasmStats {
                total: judged.len(),
                sarcastic,
                percentage: percentage(sarcastic, judged.len()),
            },
        }
    }

    /// Most frequent emotions, count descending.
    pub fn top_emotions(&self, limit: usize) -> &[LabelCount] {
        &self.emotions[..limit.min(self.emotions.len())]
    }

    /// Per-day, per-sentiment counts for records created in the trailing
    /// `days` window ending at `now`. Sorted by date, then sentiment label.
    pub fn daily_trend(
        records: &[SentimentRecord],
        days: u32,
        now: DateTime<Utc>,
    ) -> Vec<DailyCount> {
        // Windows reaching past the earliest representable date cover everything.
        let start = now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut buckets: BTreeMap<(NaiveDate, String), usize> = BTreeMap::new();

        for record in records
            .iter()
            .filter(|r| r.created_at >= start && r.created_at <= now)
        {
            *buckets
                .entry((record.created_at.date_naive(), record.sentiment.clone()))
                .or_default() += 1;
        }

        buckets
            .into_iter()
            .map(|((date, sentiment), count)| DailyCount {
                date,
                sentiment,
                count,
            })
            .collect()
    }
}

fn breakdown<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<LabelCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0;
    for value in values.flatten() {
        *counts.entry(value).or_default() += 1;
        total += 1;
    }

    let mut rows: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    rows
}

fn prevailing(distribution: &[LabelCount]) -> Option<String> {
    let rank = |label: &str| {
        PREVAILING_ORDER
            .iter()
            .position(|l| *l == label)
            .unwrap_or(PREVAILING_ORDER.len())
    };
    distribution
        .iter()
        .min_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| rank(&a.label).cmp(&rank(&b.label)))
                .then_with(|| a.label.cmp(&b.label))
        })
        .map(|row| row.label.clone())
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
