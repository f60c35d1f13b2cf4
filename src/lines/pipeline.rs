//! Raw lines → enriched matchups.
//!
//! Each step is a pure function over typed records, composed in order by
//! [`build_matchups`]:
//!
//!   parse → normalize names → keep recognized games → join + derive
//!
//! Row order from the feed is preserved throughout.

use tracing::debug;

use super::affiliation::AffiliationTable;
use super::feed::{parse_lines_csv, FeedError};
use super::models::{EnrichedMatchup, LineRecord, MidweekLine};

/// Substring rewrites applied in order. These are plain substring matches with
/// no word-boundary check, so a name that merely contains "St." or "Va." is
/// rewritten too.
const SUBSTRING_REWRITES: &[(&str, &str)] = &[("St.", "State"), ("Va.", "Virginia")];

/// Whole-name rewrites; only an exact match is replaced.
const EXACT_REWRITES: &[(&str, &str)] = &[("Mississippi", "Ole Miss")];

/// Map a feed team name onto the spelling used by the affiliation table.
pub fn normalize_team_name(name: &str) -> String {
    let mut out = name.to_string();
    for (from, to) in SUBSTRING_REWRITES {
        out = out.replace(from, to);
    }
    for (from, to) in EXACT_REWRITES {
        if out == *from {
            out = (*to).to_string();
        }
    }
    out
}

pub fn normalize_names(records: Vec<LineRecord>) -> Vec<LineRecord> {
    records
        .into_iter()
        .map(|mut rec| {
            rec.home = normalize_team_name(&rec.home);
            rec.road = normalize_team_name(&rec.road);
            rec
        })
        .collect()
}

/// Drop games where neither side is in the affiliation table.
pub fn filter_recognized(records: Vec<LineRecord>, table: &AffiliationTable) -> Vec<LineRecord> {
    let before = records.len();
    let kept: Vec<LineRecord> = records
        .into_iter()
        .filter(|rec| table.contains(&rec.home) || table.contains(&rec.road))
        .collect();
    debug!("Kept {} of {} games with a Power-5 side", kept.len(), before);
    kept
}

/// Render a spread the way a float column prints: always at least one decimal.
/// A pick'em keeps its sign flip and shows "-0.0"; a blank cell shows "nan".
fn format_spread(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Name the favorite for a spread: negative favors the road team.
pub fn favorite_line(home: &str, road: &str, spread: f64) -> String {
    if spread < 0.0 {
        format!("{} {}", road, format_spread(spread))
    } else {
        format!("{} {}", home, format_spread(-spread))
    }
}

/// "{team} by {margin}" with a positive one-decimal margin.
pub fn predicted_winner(home: &str, road: &str, lineavg: f64) -> String {
    if lineavg.is_nan() {
        format!("{} by nan", home)
    } else if lineavg < 0.0 {
        format!("{} by {:.1}", road, -lineavg)
    } else {
        format!("{} by {:.1}", home, lineavg)
    }
}

/// The higher cover probability and who holds it. Ties go to the home side.
pub fn brinks(home: &str, road: &str, p_home: f64, p_road: f64) -> (f64, String) {
    if p_home >= p_road {
        (p_home, format!("{} covers", home))
    } else {
        (p_road, format!("{} covers", road))
    }
}

/// Join affiliations onto one game and derive its display columns.
pub fn enrich(rec: LineRecord, table: &AffiliationTable) -> EnrichedMatchup {
    let home_team_conference = table.conference_label(&rec.home);
    let road_team_conference = table.conference_label(&rec.road);

    let prob_home_team_covers = rec.phcover;
    let prob_road_team_covers = 1.0 - rec.phcover;
    let (brinks_number, brinks_label) = brinks(
        &rec.home,
        &rec.road,
        prob_home_team_covers,
        prob_road_team_covers,
    );

    EnrichedMatchup {
        matchup: format!("{} @ {}", rec.road, rec.home),
        home_team_conference,
        road_team_conference,
        opening_line: favorite_line(&rec.home, &rec.road, rec.lineopen),
        current_line: favorite_line(&rec.home, &rec.road, rec.line),
        line_movement: (rec.line - rec.lineopen).abs(),
        midweek_line: MidweekLine::from(rec.linemidweek),
        prob_home_team_covers,
        prob_road_team_covers,
        avg_predicted_winner: predicted_winner(&rec.home, &rec.road, rec.lineavg),
        prediction_st_dev: rec.linestd,
        prob_home_team_wins: rec.phwin,
        brinks_number,
        brinks_label,
        home: rec.home,
        road: rec.road,
    }
}

pub fn enrich_all(records: Vec<LineRecord>, table: &AffiliationTable) -> Vec<EnrichedMatchup> {
    records.into_iter().map(|rec| enrich(rec, table)).collect()
}

/// Run the full pipeline over fetched CSV text.
pub fn build_matchups(csv_text: &str, table: &AffiliationTable) -> Result<Vec<EnrichedMatchup>, FeedError> {
    let raw = parse_lines_csv(csv_text)?;
    let normalized = normalize_names(raw);
    let recognized = filter_recognized(normalized, table);
    Ok(enrich_all(recognized, table))
}
