use amrgraph_consolidate::{
    consolidate, consolidate_bank, ChainMember, ConsolidationConfig, CorefChain, Meaning, Mention,
    NoCoreference,
};
use amrgraph_dsl::{AmrSentence, ParseOptions};
use std::collections::BTreeSet;

// ============================================================================
// Fixtures
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

fn sentence(id: &str, text: &str, amr: &str, header: Option<&str>) -> AmrSentence {
    AmrSentence::parse(id, tokens(text), amr, header, &ParseOptions::default()).expect("parse")
}

fn obama_visits_paris() -> AmrSentence {
    sentence(
        "s1",
        "Barack Obama visited Paris",
        r#"(v / visit-01
              :ARG0 (p / person :name (n / name :op1 "Barack" :op2 "Obama"))
              :ARG1 (c / city :name (m / name :op1 "Paris")))"#,
        Some("0-2|0.0+0.0.0+0.0.0.0+0.0.0.1 2-3|0 3-4|0.1+0.1.0+0.1.0.0"),
    )
}

fn obama_spoke() -> AmrSentence {
    sentence(
        "s2",
        "Obama spoke",
        r#"(s / speak-01 :ARG0 (p / person :name (n / name :op1 "Obama")))"#,
        Some("0-1|0.0+0.0.0+0.0.0.0 1-2|0"),
    )
}

fn he_left() -> AmrSentence {
    sentence("s3", "He left", "(l / leave-11~e.1 :ARG0 (h / he~e.0))", None)
}

fn dictionary(mention: &Mention) -> Vec<(Meaning, f64)> {
    match mention.text.as_str() {
        "Barack Obama" => vec![(Meaning::entity("Q76"), 0.9)],
        "Obama" => vec![(Meaning::entity("Q76"), 0.7), (Meaning::concept("obama"), 0.2)],
        "Barack" => vec![(Meaning::entity("Q1"), 0.3)],
        "Paris" => vec![(Meaning::entity("Q90"), 0.8)],
        "visited" => vec![(Meaning::concept("visit"), 0.5)],
        "New York City" => vec![(Meaning::entity("Q60"), 0.95)],
        "New" => vec![(Meaning::concept("new"), 0.4)],
        "York" => vec![(Meaning::entity("Q42462"), 0.6)],
        "City" => vec![(Meaning::concept("city"), 0.5)],
        _ => Vec::new(),
    }
}

fn sequential() -> ConsolidationConfig {
    ConsolidationConfig {
        parallel: false,
        ..ConsolidationConfig::default()
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn shared_named_entities_are_merged() {
    init_tracing();
    let sentences = vec![obama_visits_paris(), obama_spoke()];
    let result = consolidate(&sentences, &dictionary, &NoCoreference, &sequential()).unwrap();
    let global = &result.graph;
    let report = &result.report;

    // s1: n + two ops + m + one op; s2: n + one op
    assert_eq!(report.names_removed, 7);
    assert_eq!(report.merge.entity_groups_merged, 1);
    assert_eq!(report.merge.entity_absorbed, 1);

    let obama = global.vertex("s1", "p").expect("s1.p survives");
    assert_eq!(global.vertex("s2", "p"), Some(obama));
    let note = global.note(obama).unwrap();
    let chosen = note.chosen.as_ref().unwrap();
    assert_eq!(chosen.meaning, Meaning::entity("Q76"));
    assert_eq!(chosen.mention.text, "Barack Obama");
    assert_eq!(note.types, BTreeSet::from(["person".to_string()]));
    assert!(note.mentions.iter().any(|m| m.sentence == "s2" && m.text == "Obama"));

    // s2's speak-01 now points at the merged Obama vertex
    let speak = global.vertex("s2", "s").unwrap();
    assert!(global.graph.has_edge(speak, ":ARG0", obama));
    assert_eq!(report.vertices, 4);
    assert_eq!(report.edges, 3);
}

#[test]
fn coreference_chains_contract_into_the_strongest_member() {
    init_tracing();
    let sentences = vec![obama_visits_paris(), obama_spoke(), he_left()];
    let chains = vec![CorefChain::new(vec![
        ChainMember::new("s3", "h"),
        ChainMember::new("s1", "p"),
        ChainMember::new("s1", "n"),
        ChainMember::new("s2", "p"),
    ])];
    let result = consolidate(&sentences, &dictionary, &chains, &sequential()).unwrap();
    let global = &result.graph;

    assert_eq!(result.report.merge.chains_merged, 1);
    assert_eq!(result.report.merge.coref_absorbed, 2);
    // s1.n was removed with the name structure
    assert_eq!(result.report.merge.unresolved_members, 1);
    // everything already merged, nothing left for entity grouping
    assert_eq!(result.report.merge.entity_groups_merged, 0);

    let obama = global.vertex("s1", "p").unwrap();
    assert_eq!(global.vertex("s3", "h"), Some(obama));
    let leave = global.vertex("s3", "l").unwrap();
    assert!(global.graph.has_edge(leave, ":ARG0", obama));
    let types = &global.note(obama).unwrap().types;
    assert!(types.contains("he") && types.contains("person"));
}

#[test]
fn multiword_span_collapses_into_its_head() {
    let sentences = vec![sentence(
        "nyc",
        "New York City is big",
        "(b / big~e.4 :domain (c / city~e.2 :part (n / new~e.0) :part (y / york~e.1)))",
        None,
    )];
    let result = consolidate(&sentences, &dictionary, &NoCoreference, &sequential()).unwrap();
    let report = &result.report;
    assert_eq!(report.multiwords.worklist, 1);
    assert_eq!(report.multiwords.collapsed, 1);
    assert_eq!(report.multiwords.absorbed, 2);

    let global = &result.graph;
    let city = global.vertex("nyc", "c").unwrap();
    // absorbed before the merge, so never part of the corpus graph
    assert_eq!(global.vertex("nyc", "y"), None);
    let note = global.note(city).unwrap();
    assert_eq!(note.chosen.as_ref().unwrap().meaning.reference, "Q60");
    assert_eq!(
        note.types,
        BTreeSet::from(["city".to_string(), "new".to_string(), "york".to_string()])
    );
    assert_eq!(report.vertices, 2);
    assert_eq!(report.edges, 1);
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let sentences = vec![obama_visits_paris(), obama_spoke(), he_left()];
    let parallel = consolidate(&sentences, &dictionary, &NoCoreference, &ConsolidationConfig::default()).unwrap();
    let sequential = consolidate(&sentences, &dictionary, &NoCoreference, &sequential()).unwrap();
    assert_eq!(parallel.report, sequential.report);
    assert_eq!(parallel.export(), sequential.export());
}

#[test]
fn bank_failures_are_reported_not_fatal() {
    init_tracing();
    let bank = "\
# ::id s1
# ::tok boy wants to go
(w / want-01 :ARG0 (b / boy~e.0) :ARG1 (g / go-01~e.3 :ARG0 b))

# ::id s2
# ::tok oops
(w / want-01 :ARG0

# ::id s3
# ::tok nothing here
";
    let result = consolidate_bank(bank, &dictionary, &NoCoreference, &ConsolidationConfig::default()).unwrap();
    assert_eq!(result.report.sentences, 1);
    let skipped: Vec<_> = result.report.skipped.iter().map(|s| s.id.as_deref()).collect();
    assert_eq!(skipped, vec![Some("s2"), Some("s3")]);

    let global = &result.graph;
    let w = global.vertex("s1", "w").unwrap();
    let b = global.vertex("s1", "b").unwrap();
    let g = global.vertex("s1", "g").unwrap();
    assert!(global.graph.has_edge(w, ":ARG0", b));
    assert!(global.graph.has_edge(w, ":ARG1", g));
    assert!(global.graph.has_edge(g, ":ARG0", b));
    assert_eq!(result.report.vertices, 3);
}
