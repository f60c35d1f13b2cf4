use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One row of the local Power-5 reference table
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AffiliationRecord {
    #[serde(rename = "School")]
    pub school: String,
    #[serde(rename = "Conference")]
    pub conference: String,
}

/// Raw per-game row from the predictions CSV. Columns not listed here are ignored.
///
/// Blank numeric cells read as NaN, so one incomplete row (often a game the
/// filter drops anyway) does not fail the feed. Non-numeric text still does.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineRecord {
    pub home: String,
    pub road: String,
    /// Opening spread; negative means the road team is favored
    #[serde(deserialize_with = "blank_as_nan")]
    pub lineopen: f64,
    /// Current spread
    #[serde(deserialize_with = "blank_as_nan")]
    pub line: f64,
    /// Midweek spread, empty until published
    pub linemidweek: Option<f64>,
    /// Mean of the tracked prediction systems
    #[serde(deserialize_with = "blank_as_nan")]
    pub lineavg: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub linestd: f64,
    #[serde(deserialize_with = "blank_as_nan")]
    pub linemedian: f64,
    /// Probability the home team covers (0.0–1.0)
    #[serde(deserialize_with = "blank_as_nan")]
    pub phcover: f64,
    /// Probability the home team wins outright (0.0–1.0)
    #[serde(deserialize_with = "blank_as_nan")]
    pub phwin: f64,
}

fn blank_as_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Midweek spread, or the sentinel shown before one is posted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MidweekLine {
    Line(f64),
    NoLineYet,
}

pub const NO_LINE_YET: &str = "no line yet";

impl MidweekLine {
    /// Numeric value, if a line has been posted.
    pub fn value(&self) -> Option<f64> {
        match self {
            MidweekLine::Line(v) => Some(*v),
            MidweekLine::NoLineYet => None,
        }
    }
}

impl From<Option<f64>> for MidweekLine {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(v) if !v.is_nan() => MidweekLine::Line(v),
            _ => MidweekLine::NoLineYet,
        }
    }
}

impl Serialize for MidweekLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value() {
            Some(v) => serializer.serialize_f64(v),
            None => serializer.serialize_str(NO_LINE_YET),
        }
    }
}

/// A game joined with affiliations and the derived display columns.
///
/// Field order is the dashboard's column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedMatchup {
    pub home: String,
    pub road: String,
    /// "{road} @ {home}"
    pub matchup: String,
    #[serde(rename = "homeTeam_conference")]
    pub home_team_conference: String,
    #[serde(rename = "roadTeam_conference")]
    pub road_team_conference: String,
    pub opening_line: String,
    pub current_line: String,
    /// abs(line - lineopen)
    pub line_movement: f64,
    pub midweek_line: MidweekLine,
    #[serde(rename = "prob_homeTeam_covers")]
    pub prob_home_team_covers: f64,
    #[serde(rename = "prob_roadTeam_covers")]
    pub prob_road_team_covers: f64,
    pub avg_predicted_winner: String,
    pub prediction_st_dev: f64,
    #[serde(rename = "prob_homeTeam_wins")]
    pub prob_home_team_wins: f64,
    /// The larger of the two cover probabilities
    pub brinks_number: f64,
    /// "{team} covers" for the side holding `brinks_number`
    pub brinks_label: String,
}

/// What the cache hands out: one pipeline run plus when it happened.
#[derive(Debug, Clone, Serialize)]
pub struct LinesSnapshot {
    pub matchups: Vec<EnrichedMatchup>,
    pub fetched_at: DateTime<Utc>,
    /// Freshness text scraped from the metadata page, when enabled
    pub last_updated: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midweek_serializes_number_or_sentinel() {
        assert_eq!(serde_json::to_value(MidweekLine::Line(-4.5)).unwrap(), serde_json::json!(-4.5));
        assert_eq!(
            serde_json::to_value(MidweekLine::NoLineYet).unwrap(),
            serde_json::json!("no line yet")
        );
    }

    #[test]
    fn test_midweek_from_option() {
        assert_eq!(MidweekLine::from(Some(3.0)), MidweekLine::Line(3.0));
        assert_eq!(MidweekLine::from(None), MidweekLine::NoLineYet);
        assert_eq!(MidweekLine::from(Some(f64::NAN)), MidweekLine::NoLineYet);
        assert!(MidweekLine::NoLineYet.value().is_none());
    }

    #[test]
    fn test_enriched_column_order() {
        let m = EnrichedMatchup {
            home: "Ohio State".into(),
            road: "Michigan".into(),
            matchup: "Michigan @ Ohio State".into(),
            home_team_conference: "Big Ten".into(),
            road_team_conference: "Big Ten".into(),
            opening_line: "Michigan -3.5".into(),
            current_line: "Michigan -6.0".into(),
            line_movement: 2.5,
            midweek_line: MidweekLine::NoLineYet,
            prob_home_team_covers: 0.4,
            prob_road_team_covers: 0.6,
            avg_predicted_winner: "Michigan by 4.0".into(),
            prediction_st_dev: 2.1,
            prob_home_team_wins: 0.35,
            brinks_number: 0.6,
            brinks_label: "Michigan covers".into(),
        };
        let json = serde_json::to_string(&m).unwrap();
        let keys = [
            "\"home\"",
            "\"road\"",
            "\"matchup\"",
            "\"homeTeam_conference\"",
            "\"roadTeam_conference\"",
            "\"opening_line\"",
            "\"current_line\"",
            "\"line_movement\"",
            "\"midweek_line\"",
            "\"prob_homeTeam_covers\"",
            "\"prob_roadTeam_covers\"",
            "\"avg_predicted_winner\"",
            "\"prediction_st_dev\"",
            "\"prob_homeTeam_wins\"",
            "\"brinks_number\"",
            "\"brinks_label\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "columns out of order: {}", json);
    }
}
