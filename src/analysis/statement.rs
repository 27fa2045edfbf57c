//! Plain-text narrative of one change point.

use crate::domain::{ChangePointRecord, Direction, EventAssociation, ImpactRecord, VolatilityDirection};

const RULE_WIDTH: usize = 70;
/// Event distances (days) for the causality hints.
const CLOSE_ALIGNMENT_DAYS: i64 = 7;
const POSSIBLE_ASSOCIATION_DAYS: i64 = 30;

fn pct_label(pct: Option<f64>) -> String {
    match pct {
        Some(p) => format!("{p:+.2}%"),
        None => "n/a".to_string(),
    }
}

/// Render the change point, its impact and (optionally) its closest event.
///
/// The text is deterministic for a given input.
pub fn generate_impact_statement(
    changepoint: &ChangePointRecord,
    impact: &ImpactRecord,
    association: Option<&EventAssociation>,
) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    out.push_str(&format!("{rule}\nCHANGE POINT ANALYSIS SUMMARY\n{rule}\n\n"));
    out.push_str(&format_location(changepoint));

    out.push_str("\nImpact on Mean:\n");
    out.push_str(&format!("   Before: {:.6}\n", impact.mu_before));
    out.push_str(&format!("   After:  {:.6}\n", impact.mu_after));
    out.push_str(&format!(
        "   Change: {:+.6} ({})\n",
        impact.mean_change,
        pct_label(impact.mean_change_pct)
    ));
    out.push_str(&format!("   Direction: {}\n", impact.direction.as_str().to_uppercase()));
    out.push_str(&format!("   Magnitude: {}\n", impact.magnitude.as_str().to_uppercase()));

    if let Some(vol) = &impact.volatility {
        out.push_str("\nImpact on Volatility:\n");
        out.push_str(&format!("   Before: {:.6}\n", vol.sigma_before));
        out.push_str(&format!("   After:  {:.6}\n", vol.sigma_after));
        out.push_str(&format!(
            "   Change: {:+.6} ({})\n",
            vol.sigma_change,
            pct_label(vol.sigma_change_pct)
        ));
        out.push_str(&format!(
            "   Volatility: {}\n",
            vol.volatility_direction.as_str().to_uppercase()
        ));
    }

    if let Some(assoc) = association {
        out.push_str(&format_association(assoc));
    }

    out.push_str("\nInterpretation:\n");
    let strength = if impact.magnitude.is_strong() { "Strong" } else { "Moderate" };
    out.push_str(&match impact.direction {
        Direction::Increase => format!("   {strength} positive shift detected in the time series.\n"),
        Direction::Decrease => format!("   {strength} negative shift detected in the time series.\n"),
        Direction::Minimal => "   Minimal change in central tendency detected.\n".to_string(),
    });

    if let Some(vol) = &impact.volatility {
        out.push_str(match vol.volatility_direction {
            VolatilityDirection::Increase => "   Volatility increased, indicating higher market uncertainty.\n",
            VolatilityDirection::Decrease => "   Volatility decreased, indicating more stable conditions.\n",
        });
    }

    if let Some(days) = association.and_then(|a| a.days_from_closest).map(i64::abs) {
        if days <= CLOSE_ALIGNMENT_DAYS {
            out.push_str(&format!("   Timing closely aligns with major event (within {days} days).\n"));
        } else if days <= POSSIBLE_ASSOCIATION_DAYS {
            out.push_str(&format!("   Potential association with event ({days} days difference).\n"));
        }
    }

    out.push('\n');
    out.push_str(&rule);
    out
}

fn format_location(changepoint: &ChangePointRecord) -> String {
    let ci_pct = (changepoint.ci_probability * 100.0).round() as i64;
    let mut out = String::new();
    match changepoint.date {
        Some(date) => {
            out.push_str(&format!("Change Point Detected: {}\n", date.format("%Y-%m-%d")));
            out.push_str(&format!("   Index: {}\n", changepoint.index));
            if let Some((lo, hi)) = changepoint.ci_dates {
                out.push_str(&format!(
                    "   {ci_pct}% Credible Interval: [{}, {}]\n",
                    lo.format("%Y-%m-%d"),
                    hi.format("%Y-%m-%d")
                ));
            }
        }
        None => {
            let (lo, hi) = changepoint.credible_interval;
            out.push_str(&format!("Change Point Detected at Index: {}\n", changepoint.index));
            out.push_str(&format!("   {ci_pct}% Credible Interval: [{lo}, {hi}] (index)\n"));
        }
    }
    out
}

fn format_association(assoc: &EventAssociation) -> String {
    let mut out = String::from("\nAssociated Events:\n");
    match (&assoc.closest_event, assoc.days_from_closest) {
        (Some(nearby), Some(days)) => {
            let event = &nearby.event;
            out.push_str(&format!("   Event: {}\n", event.name));
            out.push_str(&format!("   Event Date: {}\n", event.date.format("%Y-%m-%d")));
            out.push_str(&format!("   Distance: {days} days\n"));
            out.push_str(&format!("   Type: {}\n", event.event_type));
            if let Some(expected) = &event.expected_impact {
                out.push_str(&format!("   Expected Impact: {expected}\n"));
            }
            if assoc.num_events_in_window > 1 {
                out.push_str(&format!("   ({} events within window)\n", assoc.num_events_in_window));
            }
        }
        _ => out.push_str(&format!("   No events found within ±{} day window\n", assoc.window_days)),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EstimateMethod, Event, Magnitude, NearbyEvent, VolatilityImpact};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn changepoint(dated: bool) -> ChangePointRecord {
        ChangePointRecord {
            index: 45,
            date: dated.then(|| date(2020, 3, 9)),
            estimate_method: EstimateMethod::Mean,
            credible_interval: (43, 48),
            ci_dates: dated.then(|| (date(2020, 3, 5), date(2020, 3, 12))),
            ci_probability: 0.94,
            posterior_std: 1.2,
            posterior_samples: 4000,
        }
    }

    fn impact(direction: Direction, magnitude: Magnitude) -> ImpactRecord {
        ImpactRecord {
            mu_before: 60.0,
            mu_after: 35.0,
            mu_before_ci: (58.0, 62.0),
            mu_after_ci: (33.0, 37.0),
            mean_change: -25.0,
            mean_change_pct: Some(-41.6667),
            direction,
            magnitude,
            magnitude_in_std: 1.8,
            volatility: Some(VolatilityImpact {
                sigma_before: 2.0,
                sigma_after: 5.0,
                sigma_before_ci: (1.8, 2.2),
                sigma_after_ci: (4.5, 5.5),
                sigma_change: 3.0,
                sigma_change_pct: Some(150.0),
                volatility_direction: VolatilityDirection::Increase,
            }),
        }
    }

    fn association(days: Option<i64>, count: usize) -> EventAssociation {
        let closest = days.map(|d| NearbyEvent {
            event: Event {
                date: date(2020, 3, 9) + chrono::Duration::days(d),
                name: "OPEC+ talks collapse".to_string(),
                event_type: "geopolitical".to_string(),
                description: None,
                expected_impact: Some("decrease".to_string()),
            },
            days_from_changepoint: d,
        });
        EventAssociation {
            changepoint_date: date(2020, 3, 9),
            changepoint_index: 45,
            window_days: 30,
            associated_events: closest.iter().cloned().collect(),
            closest_event: closest,
            days_from_closest: days,
            num_events_in_window: count,
        }
    }

    #[test]
    fn statement_has_dates_labels_and_event() {
        let text = generate_impact_statement(
            &changepoint(true),
            &impact(Direction::Decrease, Magnitude::Large),
            Some(&association(Some(-3), 2)),
        );
        assert!(text.starts_with(&"=".repeat(70)));
        assert!(text.contains("CHANGE POINT ANALYSIS SUMMARY"));
        assert!(text.contains("Change Point Detected: 2020-03-09"));
        assert!(text.contains("94% Credible Interval: [2020-03-05, 2020-03-12]"));
        assert!(text.contains("Change: -25.000000 (-41.67%)"));
        assert!(text.contains("Direction: DECREASE"));
        assert!(text.contains("Magnitude: LARGE"));
        assert!(text.contains("Volatility: INCREASE"));
        assert!(text.contains("Event: OPEC+ talks collapse"));
        assert!(text.contains("Event Date: 2020-03-06"));
        assert!(text.contains("Distance: -3 days"));
        assert!(text.contains("Expected Impact: decrease"));
        assert!(text.contains("(2 events within window)"));
        assert!(text.contains("Strong negative shift"));
        assert!(text.contains("Volatility increased"));
        assert!(text.contains("closely aligns with major event (within 3 days)"));
    }

    #[test]
    fn statement_without_dates_or_events() {
        let mut imp = impact(Direction::Minimal, Magnitude::Small);
        imp.mean_change_pct = None;
        imp.volatility = None;
        let text = generate_impact_statement(&changepoint(false), &imp, None);
        assert!(text.contains("Change Point Detected at Index: 45"));
        assert!(text.contains("[43, 48] (index)"));
        assert!(text.contains("(n/a)"));
        assert!(text.contains("Minimal change in central tendency"));
        assert!(!text.contains("Associated Events"));
        assert!(!text.contains("Volatility"));
    }

    #[test]
    fn causality_hint_depends_on_distance() {
        let cp = changepoint(true);
        let imp = impact(Direction::Increase, Magnitude::Moderate);

        let text = generate_impact_statement(&cp, &imp, Some(&association(Some(20), 1)));
        assert!(text.contains("Moderate positive shift"));
        assert!(text.contains("Potential association with event (20 days difference)."));
        assert!(!text.contains("events within window"));

        let text = generate_impact_statement(&cp, &imp, Some(&association(None, 0)));
        assert!(text.contains("No events found within ±30 day window"));
        assert!(!text.contains("aligns"));
    }

    #[test]
    fn sections_are_separated_by_blank_lines() {
        let text = generate_impact_statement(
            &changepoint(true),
            &impact(Direction::Decrease, Magnitude::Large),
            Some(&association(Some(12), 1)),
        );
        let rule = "=".repeat(70);
        assert!(text.starts_with(&format!("{rule}\nCHANGE POINT ANALYSIS SUMMARY\n{rule}\n\nChange Point Detected")));
        for header in ["Impact on Mean:", "Impact on Volatility:", "Associated Events:", "Interpretation:"] {
            assert!(text.contains(&format!("\n\n{header}\n")), "{header}");
        }
        assert!(text.ends_with(&format!(".\n\n{rule}")));
        assert!(!text.contains("\n\n\n"));
    }
}
