// tests/relevance_handpicked.rs
// Hand-picked headlines scored against the shipped taxonomy in config/sources.toml.

use family_news_pipeline::config::load_config_from;
use family_news_pipeline::relevance::{
    RelevanceScorer, CATEGORY_ACTIVITIES_HEALTH, CATEGORY_EDUCATION_FAMILY, CATEGORY_EVENTS, CATEGORY_GENERAL,
};
use family_news_pipeline::RelevanceLevel;
use std::path::Path;

fn scorer() -> RelevanceScorer {
    let cfg = load_config_from(Path::new("config/sources.toml")).expect("shipped config parses");
    RelevanceScorer::new(cfg.taxonomy().expect("non-empty taxonomy"))
}

#[test]
fn school_safety_story_is_high_education() {
    let r = scorer().score_text("CMSD Announces New School Safety Initiative for every student");
    assert_eq!(r.level, RelevanceLevel::High);
    assert_eq!(r.category, CATEGORY_EDUCATION_FAMILY);
    for kw in ["cmsd", "school", "safety", "student"] {
        assert!(r.matched.contains(kw), "missing {kw}");
    }
}

#[test]
fn park_story_is_activities() {
    let r = scorer().score_text("Metroparks adds a new playground near the zoo");
    assert_eq!(r.category, CATEGORY_ACTIVITIES_HEALTH);
    assert_eq!(r.level, RelevanceLevel::High);
}

#[test]
fn single_event_keyword_is_medium_events() {
    let r = scorer().score_text("Spring festival returns downtown this weekend");
    assert_eq!(r.level, RelevanceLevel::Medium);
    assert_eq!(r.category, CATEGORY_EVENTS);
}

#[test]
fn unrelated_story_is_none_general() {
    let r = scorer().score_text("Browns trade rumors heat up before the draft");
    assert_eq!(r.level, RelevanceLevel::None);
    assert_eq!(r.category, CATEGORY_GENERAL);
    assert!(r.matched.is_empty());
}

#[test]
fn multiword_keyword_matches_as_phrase() {
    let s = scorer();
    assert!(s.score_text("Family fun night at the rec center").matched.contains("family fun"));
    assert!(!s.score_text("Fun for the whole family tonight").matched.contains("family fun"));
}

#[test]
fn adding_keywords_never_lowers_the_score() {
    let s = scorer();
    let words = ["school", "park", "festival", "library", "kids", "museum", "workshop"];
    let mut text = String::from("Weekend roundup:");
    let mut last = s.score_text(&text).score;
    for w in words {
        text.push(' ');
        text.push_str(w);
        let now = s.score_text(&text).score;
        assert!(now >= last, "score dropped after adding {w}: {last} -> {now}");
        last = now;
    }
}

#[test]
fn scoring_is_deterministic() {
    let s = scorer();
    let t = "Library storytime and a museum workshop for kids";
    assert_eq!(s.score_text(t), s.score_text(t));
}
