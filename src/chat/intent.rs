//! Intent Responder
//! Answers free-text questions about the analysis view with an ordered list of
//! keyword rules. The first rule whose predicate matches produces the answer,
//! so rule order decides which intent wins when several apply.

use crate::data::{DataProcessor, ProcessorError};
use crate::stats::format_count;
use polars::prelude::DataFrame;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

static TOP_N_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"top (\d+)").unwrap());
static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());

pub const NO_DATA_MESSAGE: &str = "The data could not be loaded.";

pub const EMPTY_DATA_MESSAGE: &str = "The dataset does not contain any EV sales records.";

pub const HELP_MESSAGE: &str = "I'm not sure how to answer that. Try asking questions like \
'What are the top 5 regions?' or 'Which year had the highest sales?'";

pub const EV_INFO_MESSAGE: &str = "An **Electric Vehicle (EV)** uses one or more electric motors \
for power, running on rechargeable batteries instead of a gasoline engine.\n\n\
Key benefits include zero tailpipe emissions, a quieter ride, and lower running costs.";

const ERROR_MESSAGE: &str = "Something went wrong while reading the sales data.";

const PEAK_YEAR_WORDS: [&str; 4] = ["highest", "top", "best", "peak"];
const RANKING_WORDS: [&str; 5] = ["highest", "top", "biggest", "best", "largest"];
const LATEST_WORDS: [&str; 2] = ["current", "latest"];
const EV_INFO_PHRASES: [&str; 3] = ["what is ev", "tell me about ev", "about evs"];

/// What a query was understood to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    PeakYear,
    TopRegions,
    LatestYear,
    EvInfo,
    YearTotal,
    RegionTotal,
    Fallback,
}

/// A lowercased query.
pub struct Query {
    text: String,
}

impl Query {
    pub fn new(raw: &str) -> Self {
        Self {
            text: raw.to_lowercase(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn mentions_any(&self, words: &[&str]) -> bool {
        words.iter().any(|w| self.text.contains(w))
    }
}

type Predicate = fn(&IntentResponder, &Query, &DataFrame) -> bool;
type Handler = fn(&IntentResponder, &Query, &DataFrame) -> Result<String, ProcessorError>;

struct IntentRule {
    intent: Intent,
    matches: Predicate,
    answer: Handler,
}

pub struct IntentResponder {
    rules: Vec<IntentRule>,
}

impl Default for IntentResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentResponder {
    pub fn new() -> Self {
        let rules = vec![
            IntentRule {
                intent: Intent::PeakYear,
                matches: |_, q, _| q.mentions_any(&PEAK_YEAR_WORDS) && q.text.contains("year"),
                answer: Self::answer_peak_year,
            },
            IntentRule {
                intent: Intent::TopRegions,
                matches: |_, q, _| q.mentions_any(&RANKING_WORDS),
                answer: Self::answer_top_regions,
            },
            IntentRule {
                intent: Intent::LatestYear,
                matches: |_, q, _| q.mentions_any(&LATEST_WORDS),
                answer: Self::answer_latest_year,
            },
            IntentRule {
                intent: Intent::EvInfo,
                matches: |_, q, _| q.mentions_any(&EV_INFO_PHRASES),
                answer: |_, _, _| Ok(EV_INFO_MESSAGE.to_string()),
            },
            IntentRule {
                intent: Intent::YearTotal,
                matches: |_, q, _| YEAR_RE.is_match(&q.text),
                answer: Self::answer_year_total,
            },
            IntentRule {
                intent: Intent::RegionTotal,
                matches: |r, q, df| matches!(r.matched_region(q, df), Ok(Some(_))),
                answer: Self::answer_region_total,
            },
        ];

        Self { rules }
    }

    /// The intent the first matching rule assigns to `query`.
    pub fn classify(&self, query: &str, df: &DataFrame) -> Intent {
        let query = Query::new(query);
        self.matching_rule(&query, df)
            .map(|rule| rule.intent)
            .unwrap_or(Intent::Fallback)
    }

    /// Answer `query` from `data`. Never fails; problems become messages.
    pub fn respond(&self, query: &str, data: Option<&DataFrame>) -> String {
        let Some(df) = data else {
            return NO_DATA_MESSAGE.to_string();
        };

        let query = Query::new(query);
        let Some(rule) = self.matching_rule(&query, df) else {
            debug!(query = query.text(), "No intent matched");
            return HELP_MESSAGE.to_string();
        };

        debug!(query = query.text(), intent = ?rule.intent, "Matched intent");
        (rule.answer)(self, &query, df).unwrap_or_else(|e| {
            warn!(error = %e, intent = ?rule.intent, "Failed to answer query");
            ERROR_MESSAGE.to_string()
        })
    }

    fn matching_rule(&self, query: &Query, df: &DataFrame) -> Option<&IntentRule> {
        self.rules.iter().find(|rule| (rule.matches)(self, query, df))
    }

    /// N from "top N", at least 1. Digits too large for `usize` ask for every region.
    fn requested_count(&self, query: &Query) -> usize {
        TOP_N_RE
            .captures(&query.text)
            .map(|c| c[1].parse::<usize>().unwrap_or(usize::MAX))
            .unwrap_or(1)
            .max(1)
    }

    fn matched_region(&self, query: &Query, df: &DataFrame) -> Result<Option<String>, ProcessorError> {
        Ok(DataProcessor::regions_in_order(df)?
            .into_iter()
            .find(|region| query.text.contains(&region.to_lowercase())))
    }

    fn answer_peak_year(&self, _: &Query, df: &DataFrame) -> Result<String, ProcessorError> {
        let Some((year, total)) = DataProcessor::peak_year(df)? else {
            return Ok(EMPTY_DATA_MESSAGE.to_string());
        };
        Ok(format!(
            "Based on the analysis, the year with the highest EV sales was **{year}**, \
             with approximately **{}** vehicles sold globally.",
            format_count(total)
        ))
    }

    fn answer_top_regions(&self, query: &Query, df: &DataFrame) -> Result<String, ProcessorError> {
        let n = self.requested_count(query);
        let top = DataProcessor::top_regions(df, n)?;
        if top.is_empty() {
            return Ok(EMPTY_DATA_MESSAGE.to_string());
        }

        if n == 1 {
            let (region, total) = &top[0];
            return Ok(format!(
                "The region with the highest total EV sales is **{region}** with **{}** vehicles sold.",
                format_count(*total)
            ));
        }

        let mut response = format!("Here are the Top {n} regions by total EV sales:\n");
        for (i, (region, total)) in top.iter().enumerate() {
            response.push_str(&format!(
                "\n{}. **{region}**: {} vehicles",
                i + 1,
                format_count(*total)
            ));
        }
        Ok(response)
    }

    fn answer_latest_year(&self, _: &Query, df: &DataFrame) -> Result<String, ProcessorError> {
        let Some(year) = DataProcessor::latest_year(df)? else {
            return Ok(EMPTY_DATA_MESSAGE.to_string());
        };
        let total = DataProcessor::total_for_year(df, year)?;
        Ok(format!(
            "The most current sales information in the dataset is for **{year}**, \
             where total sales were **{}** vehicles.",
            format_count(total)
        ))
    }

    fn answer_year_total(&self, query: &Query, df: &DataFrame) -> Result<String, ProcessorError> {
        let Some(year) = YEAR_RE
            .captures(&query.text)
            .and_then(|c| c[1].parse::<i32>().ok())
        else {
            return Ok(HELP_MESSAGE.to_string());
        };

        let total = DataProcessor::total_for_year(df, year)?;
        if total > 0.0 {
            Ok(format!(
                "Total EV sales in **{year}** were approximately **{}** vehicles.",
                format_count(total)
            ))
        } else {
            Ok(format!("I could not find any sales data for the year {year}."))
        }
    }

    fn answer_region_total(&self, query: &Query, df: &DataFrame) -> Result<String, ProcessorError> {
        let Some(region) = self.matched_region(query, df)? else {
            return Ok(HELP_MESSAGE.to_string());
        };
        let total = DataProcessor::total_for_region(df, &region)?;
        Ok(format!(
            "Total historical sales for **{region}** are **{}** vehicles.",
            format_count(total)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::processor_tests::sales_frame;
    use crate::data::EV_SALES;

    fn frame(rows: &[(&str, i64, f64)]) -> DataFrame {
        let rows: Vec<(&str, &str, i64, f64)> = rows
            .iter()
            .map(|&(region, year, value)| (region, EV_SALES, year, value))
            .collect();
        sales_frame(&rows)
    }

    #[test]
    fn peak_year_scenario() {
        let df = frame(&[("A", 2020, 100.0), ("A", 2021, 300.0)]);
        let responder = IntentResponder::new();
        let answer = responder.respond("Which year had the highest sales", Some(&df));
        assert!(answer.contains("**2021**"), "{answer}");
        assert!(answer.contains("**300**"), "{answer}");
    }

    #[test]
    fn top_n_regions_scenario() {
        let df = frame(&[("A", 2020, 500.0), ("B", 2020, 900.0), ("C", 2020, 200.0)]);
        let answer = IntentResponder::new().respond("top 2 regions", Some(&df));
        assert_eq!(
            answer,
            "Here are the Top 2 regions by total EV sales:\n\n1. **B**: 900 vehicles\n2. **A**: 500 vehicles"
        );
    }

    #[test]
    fn single_top_region_is_one_sentence() {
        let df = frame(&[("A", 2020, 1_500.0), ("B", 2020, 2_500_000.0)]);
        let answer = IntentResponder::new().respond("Which region is the biggest market?", Some(&df));
        assert_eq!(
            answer,
            "The region with the highest total EV sales is **B** with **2,500,000** vehicles sold."
        );
    }

    #[test]
    fn peak_year_rule_shadows_ranking_and_year_rules() {
        let df = frame(&[("A", 2022, 10.0)]);
        let responder = IntentResponder::new();
        assert_eq!(responder.classify("what was the top year", &df), Intent::PeakYear);
        assert_eq!(responder.classify("top year since 2022", &df), Intent::PeakYear);
        assert_eq!(responder.classify("top 3 regions in 2022", &df), Intent::TopRegions);
        assert_eq!(responder.classify("latest numbers for 2022", &df), Intent::LatestYear);
        assert_eq!(responder.classify("tell me about EVs in 2022", &df), Intent::EvInfo);
        assert_eq!(responder.classify("sales in 2022 for a", &df), Intent::YearTotal);
        assert_eq!(responder.classify("how is A doing", &df), Intent::RegionTotal);
        assert_eq!(responder.classify("hello", &df), Intent::Fallback);
    }

    #[test]
    fn missing_year_is_reported_explicitly() {
        let df = frame(&[("A", 2020, 100.0)]);
        let answer = IntentResponder::new().respond("sales in 2019", Some(&df));
        assert_eq!(answer, "I could not find any sales data for the year 2019.");
    }

    #[test]
    fn year_total_and_latest() {
        let df = frame(&[("A", 2020, 1_000.0), ("B", 2020, 234.0), ("A", 2023, 42.0)]);
        let responder = IntentResponder::new();
        assert_eq!(
            responder.respond("sales in 2020", Some(&df)),
            "Total EV sales in **2020** were approximately **1,234** vehicles."
        );
        assert_eq!(
            responder.respond("What are the latest figures?", Some(&df)),
            "The most current sales information in the dataset is for **2023**, where total sales were **42** vehicles."
        );
    }

    #[test]
    fn ev_info_is_canned() {
        let responder = IntentResponder::new();
        let empty = frame(&[]);
        assert_eq!(responder.respond("Tell me about EV", Some(&empty)), EV_INFO_MESSAGE);
        let df = frame(&[("A", 2020, 1.0)]);
        assert_eq!(responder.respond("tell me about ev", Some(&df)), EV_INFO_MESSAGE);
    }

    #[test]
    fn region_match_is_case_insensitive() {
        let df = frame(&[("United Kingdom", 2020, 1_000.0), ("United Kingdom", 2021, 2_000.0)]);
        assert_eq!(
            IntentResponder::new().respond("what about the united kingdom?", Some(&df)),
            "Total historical sales for **United Kingdom** are **3,000** vehicles."
        );
    }

    #[test]
    fn absent_or_empty_data_never_fails() {
        let responder = IntentResponder::new();
        assert_eq!(responder.respond("top 5 regions", None), NO_DATA_MESSAGE);

        let empty = frame(&[]);
        assert_eq!(responder.respond("highest year", Some(&empty)), EMPTY_DATA_MESSAGE);
        assert_eq!(responder.respond("top 0 regions", Some(&empty)), EMPTY_DATA_MESSAGE);
        assert_eq!(responder.respond("current sales", Some(&empty)), EMPTY_DATA_MESSAGE);
        assert_eq!(responder.respond("anything else", Some(&empty)), HELP_MESSAGE);
    }

    #[test]
    fn oversized_top_n_lists_every_region() {
        let df = frame(&[("A", 2020, 5.0), ("B", 2020, 7.0)]);
        let answer = IntentResponder::new().respond("top 99999999999999999999999 regions", Some(&df));
        assert!(answer.starts_with("Here are the Top "), "{answer}");
        assert!(answer.ends_with("\n\n1. **B**: 7 vehicles\n2. **A**: 5 vehicles"), "{answer}");
    }

    #[test]
    fn top_zero_is_treated_as_top_one() {
        let df = frame(&[("A", 2020, 5.0), ("B", 2020, 7.0)]);
        let answer = IntentResponder::new().respond("top 0 regions", Some(&df));
        assert!(answer.starts_with("The region with the highest total EV sales is **B**"));
    }
}
