//! Per-line record evaluation: parse, validate, match, normalize.

use chrono::{DateTime, NaiveDate};
use common::storage::types::submission::Submission;
use common::utils::regions::RegionQuery;
use serde_json::Value;

/// Fields searched for query terms, in match priority order. `selftext` is
/// the dump's name for the submission body.
pub const SEARCH_FIELDS: [&str; 2] = ["title", "selftext"];

/// Why a line never reached the sink.
#[derive(Debug)]
pub enum SkipReason {
    /// Not valid JSON; the orchestrator logs these.
    MalformedJson(String),
    /// Required field absent or empty; dropped silently.
    MissingField(&'static str),
    /// A matched record whose `created_utc` is missing or not an epoch
    /// timestamp; it cannot produce the mandatory calendar date.
    BadTimestamp,
}

/// Outcome of evaluating one raw line against a region query. Skip decisions
/// are data, not errors: none of them aborts the file.
#[derive(Debug)]
pub enum LineOutcome {
    Matched(Box<Submission>),
    Unmatched,
    Skipped(SkipReason),
}

pub fn evaluate_line(line: &str, region: &RegionQuery) -> LineOutcome {
    let record: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(err) => return LineOutcome::Skipped(SkipReason::MalformedJson(err.to_string())),
    };

    let Some(id) = non_empty(&record, "id") else {
        return LineOutcome::Skipped(SkipReason::MissingField("id"));
    };
    let Some(subreddit) = non_empty(&record, "subreddit") else {
        return LineOutcome::Skipped(SkipReason::MissingField("subreddit"));
    };

    let searched: Vec<&str> = SEARCH_FIELDS
        .iter()
        .map(|field| text_field(&record, field))
        .collect();
    let Some(matched_query) = region.first_match(&searched) else {
        return LineOutcome::Unmatched;
    };

    let Some(created) = int_field(&record, "created_utc").and_then(epoch_date) else {
        return LineOutcome::Skipped(SkipReason::BadTimestamp);
    };

    LineOutcome::Matched(Box::new(Submission {
        id: id.to_owned(),
        created,
        author: text_field(&record, "author").to_owned(),
        title: text_field(&record, "title").to_owned(),
        body: text_field(&record, "selftext").to_owned(),
        score: int_field(&record, "score").unwrap_or(0),
        num_comments: int_field(&record, "num_comments").unwrap_or(0),
        subreddit: subreddit.to_owned(),
        subreddit_id: text_field(&record, "subreddit_id").to_owned(),
        image_url: text_field(&record, "url").to_owned(),
        image_name: None,
        matched_query: matched_query.to_owned(),
    }))
}

fn text_field<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or("")
}

fn non_empty<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

// Dump numerics show up both as JSON numbers and as quoted digit strings.
fn int_field(record: &Value, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn epoch_date(secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(secs, 0).map(|at| at.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionQuery {
        RegionQuery::new("Italy", "Roma, Milano").expect("query should build")
    }

    fn matched(line: &str) -> Submission {
        match evaluate_line(line, &region()) {
            LineOutcome::Matched(submission) => *submission,
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn matching_record_is_normalized() {
        let submission = matched(
            r#"{"id":"a1","subreddit":"x","subreddit_id":"t1","title":"Roma trip",
                "selftext":"","created_utc":"1700000000","score":"17","url":"https://x/img.png"}"#,
        );

        assert_eq!(submission.id, "a1");
        assert_eq!(submission.matched_query, "roma");
        assert_eq!(
            submission.created,
            NaiveDate::from_ymd_opt(2023, 11, 14).expect("valid date")
        );
        assert_eq!(submission.score, 17);
        assert_eq!(submission.num_comments, 0);
        assert_eq!(submission.image_url, "https://x/img.png");
        assert_eq!(submission.image_name, None);
    }

    #[test]
    fn numeric_created_utc_also_works() {
        let submission = matched(
            r#"{"id":"a1","subreddit":"x","title":"Roma","selftext":"","created_utc":1700000000}"#,
        );
        assert_eq!(
            submission.created,
            NaiveDate::from_ymd_opt(2023, 11, 14).expect("valid date")
        );
    }

    #[test]
    fn word_boundaries_gate_the_match() {
        assert!(matches!(
            evaluate_line(
                r#"{"id":"a","subreddit":"x","title":"","selftext":"Milano is beautiful","created_utc":1}"#,
                &region()
            ),
            LineOutcome::Matched(_)
        ));
        assert!(matches!(
            evaluate_line(
                r#"{"id":"a","subreddit":"x","title":"","selftext":"Milanofoo","created_utc":1}"#,
                &region()
            ),
            LineOutcome::Unmatched
        ));
    }

    #[test]
    fn title_outranks_selftext_and_term_order_breaks_ties() {
        let submission = matched(
            r#"{"id":"a","subreddit":"x","title":"Milano","selftext":"Roma","created_utc":1}"#,
        );
        assert_eq!(submission.matched_query, "milano");

        let submission = matched(
            r#"{"id":"a","subreddit":"x","title":"Milano or Roma","selftext":"","created_utc":1}"#,
        );
        assert_eq!(submission.matched_query, "roma");
    }

    #[test]
    fn records_without_id_or_subreddit_are_dropped_silently() {
        assert!(matches!(
            evaluate_line(
                r#"{"subreddit":"x","title":"Roma","created_utc":1}"#,
                &region()
            ),
            LineOutcome::Skipped(SkipReason::MissingField("id"))
        ));
        assert!(matches!(
            evaluate_line(r#"{"id":"a","title":"Roma","created_utc":1}"#, &region()),
            LineOutcome::Skipped(SkipReason::MissingField("subreddit"))
        ));
        assert!(matches!(
            evaluate_line(
                r#"{"id":"","subreddit":"x","title":"Roma","created_utc":1}"#,
                &region()
            ),
            LineOutcome::Skipped(SkipReason::MissingField("id"))
        ));
    }

    #[test]
    fn malformed_json_is_reported_not_fatal() {
        assert!(matches!(
            evaluate_line("{not json", &region()),
            LineOutcome::Skipped(SkipReason::MalformedJson(_))
        ));
        assert!(matches!(
            evaluate_line("", &region()),
            LineOutcome::Skipped(SkipReason::MalformedJson(_))
        ));
    }

    #[test]
    fn matched_record_with_unusable_timestamp_is_skipped() {
        assert!(matches!(
            evaluate_line(
                r#"{"id":"a","subreddit":"x","title":"Roma","selftext":""}"#,
                &region()
            ),
            LineOutcome::Skipped(SkipReason::BadTimestamp)
        ));
        assert!(matches!(
            evaluate_line(
                r#"{"id":"a","subreddit":"x","title":"Roma","created_utc":"soon"}"#,
                &region()
            ),
            LineOutcome::Skipped(SkipReason::BadTimestamp)
        ));
    }

    #[test]
    fn unmatched_record_with_missing_timestamp_is_just_unmatched() {
        assert!(matches!(
            evaluate_line(
                r#"{"id":"a2","subreddit":"x","subreddit_id":"t1","title":"unrelated","selftext":""}"#,
                &region()
            ),
            LineOutcome::Unmatched
        ));
    }
}
