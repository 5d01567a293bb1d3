//! Synthetic population and label generation.

use churn_intel_core::{
    config::{LabelRule, PipelineConfig, SynthesisParams},
    record::Value,
    rng::StageRng,
    synthesizer::{self, CONTRACT_TYPES, REGIONS, SECTORS},
};
use std::collections::HashSet;

fn num(v: &Value) -> f64 {
    v.as_number().expect("numeric cell")
}

fn text(v: &Value) -> &str {
    v.as_text().expect("text cell")
}

#[test]
fn population_has_requested_size_and_unique_ids() {
    let mut config = PipelineConfig::default_test();
    config.population = 1000;
    let rows = synthesizer::synthetic_population(&config);

    assert_eq!(rows.len(), 1000);
    let ids: HashSet<_> = rows.iter().map(|r| r.customer_id.as_str()).collect();
    assert_eq!(ids.len(), 1000, "customer ids must be unique");
    assert_eq!(rows[0].customer_id, "CUST-00001");
}

#[test]
fn attributes_stay_within_configured_ranges() {
    let config = PipelineConfig::default_test();
    let p = &config.synthesis;
    for r in synthesizer::synthetic_population(&config) {
        assert!(REGIONS.contains(&text(&r.values[0])));
        assert!(SECTORS.contains(&text(&r.values[1])));
        assert!(CONTRACT_TYPES.contains(&text(&r.values[2])));

        let tenure = num(&r.values[3]);
        assert!(tenure >= 1.0 && tenure <= p.max_tenure_months as f64);
        let spend = num(&r.values[4]);
        assert!(spend >= p.min_monthly_spend && spend <= p.max_monthly_spend, "spend={spend}");
        let tickets = num(&r.values[5]);
        assert!(tickets >= 0.0 && tickets <= p.max_tickets as f64);
        let days = num(&r.values[6]);
        assert!(days >= 0.0 && days <= p.max_recency_days as f64);

        assert!(matches!(r.churn, Some(0) | Some(1)));
    }
}

#[test]
fn overrides_bias_churn_upwards() {
    let mut config = PipelineConfig::default_test();
    config.population = 4000;
    let rows = synthesizer::synthetic_population(&config);

    let rate = |pred: &dyn Fn(f64, f64) -> bool| {
        let subset: Vec<_> = rows
            .iter()
            .filter(|r| pred(num(&r.values[5]), num(&r.values[6])))
            .collect();
        let churned = subset.iter().filter(|r| r.churn == Some(1)).count();
        churned as f64 / subset.len().max(1) as f64
    };

    let quiet = rate(&|tickets, days| tickets <= 5.0 && days <= 20.0);
    let inactive = rate(&|_, days| days > 20.0);
    let heavy_support = rate(&|tickets, days| tickets > 5.0 && days <= 20.0);

    assert!(quiet < 0.2, "baseline churn rate {quiet}");
    assert!(inactive > 0.35, "inactive churn rate {inactive}");
    assert!(heavy_support > 0.45, "heavy-support churn rate {heavy_support}");
}

#[test]
fn recency_override_wins_under_both_rules() {
    let params = |rule| SynthesisParams {
        label_rule: rule,
        base_churn_probability: 1.0,
        high_ticket_churn_probability: 1.0,
        inactive_churn_probability: 0.0,
        ..SynthesisParams::default()
    };
    for rule in [LabelRule::Sequential, LabelRule::Combined] {
        let mut rng = StageRng::new(42, 0);
        for _ in 0..50 {
            // Both thresholds tripped: the recency redraw (p=0) is applied last.
            assert_eq!(synthesizer::draw_churn_label(&params(rule), 9, 25, &mut rng), 0);
            // Only tickets tripped.
            assert_eq!(synthesizer::draw_churn_label(&params(rule), 9, 3, &mut rng), 1);
        }
    }
}
