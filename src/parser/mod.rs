pub mod country;
pub mod identity;
pub mod iso3166;
pub mod lists;
pub mod rules;
pub mod sections;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error};
use uuid::Uuid;

use identity::{Reconciler, Registry};
use rules::ExtractRules;
use sections::SectionError;

static H2_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());

/// One extracted agency, ready to hand to the output model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agency {
    pub name: String,
    pub uuid: Uuid,
    pub description: String,
    pub reference: Option<String>,
    pub synonyms: Option<Vec<String>>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub agencies: Vec<Agency>,
    /// Sections whose structure could not be handled. Their entries are
    /// missing from `agencies`.
    pub failures: Vec<SectionError>,
    pub sections: usize,
}

/// Four-stage pipeline per section: segment → flatten → country → identity.
/// Output follows document order.
pub fn extract_agencies(html: &str, registry: &Registry, rules: &ExtractRules) -> Extraction {
    let doc = Html::parse_document(html);
    let mut out = Extraction::default();
    let mut absorbed: Vec<ElementRef<'_>> = Vec::new();
    let mut ids = registry.reconciler();

    for h2 in doc.select(&H2_SEL) {
        if absorbed.contains(&h2) {
            continue;
        }
        let Some(label) = sections::heading_label(h2) else {
            continue;
        };
        if rules.is_skipped_section(&label) {
            debug!(section = %label, "skipping section");
            continue;
        }

        match extract_section(h2, &label, &mut ids, rules) {
            Ok((agencies, swallowed)) => {
                debug!(section = %label, count = agencies.len(), "extracted section");
                out.sections += 1;
                out.agencies.extend(agencies);
                absorbed.extend(swallowed);
            }
            Err(e) => {
                error!(section = %label, error = %e, "section extraction aborted");
                out.failures.push(e);
            }
        }
    }

    out
}

fn extract_section<'a>(
    heading: ElementRef<'a>,
    section: &str,
    ids: &mut Reconciler<'_>,
    rules: &ExtractRules,
) -> Result<(Vec<Agency>, Vec<ElementRef<'a>>), SectionError> {
    let segment = sections::segment(heading, section, rules)?;
    let country = country::resolve(section, rules);

    let agencies = segment
        .lists
        .iter()
        .flat_map(|list| lists::flatten(*list, rules))
        .map(|leaf| Agency {
            uuid: ids.identify(&leaf.name),
            name: leaf.name,
            description: leaf.description,
            reference: leaf.link,
            synonyms: leaf.synonyms,
            country_code: country.code.clone(),
            country_name: country.name.clone(),
        })
        .collect();

    Ok((agencies, segment.absorbed))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/intelligence_agencies.html").unwrap()
    }

    fn extract(html: &str, registry: &Registry) -> Extraction {
        extract_agencies(html, registry, &ExtractRules::default())
    }

    fn first_run() -> Registry {
        Registry::from_prior(None, "intelligence-agencies")
    }

    fn prior_of(ex: &Extraction) -> Registry {
        let mut prior: HashMap<String, Vec<Uuid>> = HashMap::new();
        for a in &ex.agencies {
            prior.entry(a.name.clone()).or_default().push(a.uuid);
        }
        Registry::from_prior(Some(prior), "intelligence-agencies")
    }

    fn find<'a>(agencies: &'a [Agency], name: &str) -> &'a Agency {
        agencies
            .iter()
            .find(|a| a.name == name)
            .unwrap_or_else(|| panic!("{name} missing"))
    }

    #[test]
    fn fixture_extracts_all_sections_in_order() {
        let ex = extract(&fixture(), &first_run());
        assert!(ex.failures.is_empty(), "{:?}", ex.failures);

        let mut seen: Vec<Option<&str>> = Vec::new();
        for a in &ex.agencies {
            let c = a.country_name.as_deref();
            if seen.last() != Some(&c) {
                assert!(!seen.contains(&c), "section {c:?} is split");
                seen.push(c);
            }
        }
        assert_eq!(
            seen,
            vec![
                Some("Bahamas"),
                Some("Gambia"),
                Some("Iran"),
                Some("Israel"),
                Some("Moldova"),
                None,
            ]
        );
    }

    #[test]
    fn skipped_sections_produce_nothing() {
        let ex = extract(&fixture(), &first_run());
        assert!(ex.agencies.iter().all(|a| !a.name.contains("Outline")));
        assert!(ex.agencies.iter().all(|a| a.name != "Contents"));
    }

    #[test]
    fn iran_ignore_list_applies() {
        let ex = extract(&fixture(), &first_run());
        let iran: Vec<&str> = ex
            .agencies
            .iter()
            .filter(|a| a.country_name.as_deref() == Some("Iran"))
            .map(|a| a.name.as_str())
            .collect();
        assert_eq!(
            iran,
            vec!["Ministry of Intelligence", "Intelligence Organization of the IRGC"]
        );
        assert!(ex.agencies.iter().all(|a| a.description != "Intelligence org"));
        assert_eq!(find(&ex.agencies, "Ministry of Intelligence").country_code.as_deref(), Some("IR"));
    }

    #[test]
    fn bahamas_absorbs_stray_heading() {
        let ex = extract(&fixture(), &first_run());
        let security = find(&ex.agencies, "Security and Intelligence Branch");
        assert_eq!(security.country_name.as_deref(), Some("Bahamas"));
        assert_eq!(security.country_code.as_deref(), Some("BS"));
        assert!(ex.agencies.iter().all(|a| a.country_name.as_deref() != Some("Security")));
    }

    #[test]
    fn gambia_entry_comes_from_paragraph() {
        let ex = extract(&fixture(), &first_run());
        let gambia: Vec<_> = ex
            .agencies
            .iter()
            .filter(|a| a.country_name.as_deref() == Some("Gambia"))
            .collect();
        assert_eq!(gambia.len(), 1);
        assert_eq!(gambia[0].name, "State Intelligence Services (The Gambia)");
        assert_eq!(gambia[0].country_code.as_deref(), Some("GM"));
    }

    #[test]
    fn israel_synonyms_and_references() {
        let ex = extract(&fixture(), &first_run());
        let shin_bet = find(&ex.agencies, "Shin Bet");
        assert_eq!(shin_bet.synonyms, Some(vec!["Shabak".to_string(), "Shin Bet".to_string()]));
        assert_eq!(shin_bet.reference.as_deref(), Some("https://en.wikipedia.org/wiki/Shin_Bet"));

        let mossad = find(&ex.agencies, "Mossad");
        assert_eq!(mossad.synonyms, None);
        assert_eq!(mossad.country_code.as_deref(), Some("IL"));
    }

    #[test]
    fn moldova_and_european_union_countries() {
        let ex = extract(&fixture(), &first_run());
        let sis = find(&ex.agencies, "Information and Security Service (Moldova)");
        assert_eq!(sis.country_code.as_deref(), Some("MD"));
        assert_eq!(sis.country_name.as_deref(), Some("Moldova"));

        let intcen = find(&ex.agencies, "EU Intelligence and Situation Centre");
        assert_eq!(intcen.country_code, None);
        assert_eq!(intcen.country_name, None);
    }

    #[test]
    fn registry_keeps_identifiers_stable() {
        let mossad = Uuid::parse_str("11111111-1111-4111-8111-111111111111").unwrap();
        let registry = Registry::from_prior(
            Some(HashMap::from([("Mossad".to_string(), vec![mossad])])),
            "intelligence-agencies",
        );
        let ex = extract(&fixture(), &registry);
        assert_eq!(find(&ex.agencies, "Mossad").uuid, mossad);
    }

    #[test]
    fn rerun_with_previous_output_is_idempotent() {
        let html = fixture();
        let first = extract(&html, &first_run());
        let second = extract(&html, &prior_of(&first));
        assert_eq!(first.agencies, second.agencies);
    }

    #[test]
    fn repeated_names_keep_distinct_stable_identifiers() {
        let html = r#"
            <h2><span class="mw-headline">France</span></h2>
            <ul><li>Military Intelligence</li></ul>
            <h2><span class="mw-headline">Spain</span></h2>
            <ul><li>Military Intelligence</li></ul>
        "#;
        let first = extract(html, &first_run());
        assert_eq!(first.agencies.len(), 2);
        assert_ne!(first.agencies[0].uuid, first.agencies[1].uuid);

        let second = extract(html, &prior_of(&first));
        let ids = |ex: &Extraction| ex.agencies.iter().map(|a| a.uuid).collect::<Vec<_>>();
        assert_eq!(ids(&second), ids(&first));
        assert_eq!(second.agencies[1].country_code.as_deref(), Some("ES"));
    }

    #[test]
    fn bahamas_does_not_swallow_bahrain() {
        let html = r#"
            <h2><span class="mw-headline">Bahamas</span></h2>
            <ul><li>Security and Intelligence Branch</li></ul>
            <h2><span class="mw-headline">Bahrain</span></h2>
            <ul><li>National Security Agency (Bahrain)</li></ul>
            <h2><span class="mw-headline">Bangladesh</span></h2>
            <ul><li>National Security Intelligence</li></ul>
        "#;
        let ex = extract(html, &first_run());
        assert!(ex.failures.is_empty(), "{:?}", ex.failures);
        assert_eq!(ex.sections, 3);
        let nsa = find(&ex.agencies, "National Security Agency (Bahrain)");
        assert_eq!(nsa.country_code.as_deref(), Some("BH"));
        assert_eq!(nsa.country_name.as_deref(), Some("Bahrain"));
    }

    #[test]
    fn identifiers_unique_within_run() {
        let ex = extract(&fixture(), &first_run());
        let mut ids: Vec<_> = ex.agencies.iter().map(|a| a.uuid).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ex.agencies.len());
    }

    #[test]
    fn broken_section_is_reported_and_others_survive() {
        let html = r#"
            <h2><span class="mw-headline">Atlantis</span></h2>
            <p>Nothing listed yet.</p>
            <h2><span class="mw-headline">France</span></h2>
            <ul><li><a href="/wiki/DGSE" title="Directorate-General for External Security">DGSE</a></li></ul>
        "#;
        let ex = extract(html, &first_run());
        assert_eq!(
            ex.failures,
            vec![SectionError::MissingList { section: "Atlantis".into() }]
        );
        assert_eq!(ex.agencies.len(), 1);
        assert_eq!(ex.agencies[0].country_code.as_deref(), Some("FR"));
        assert_eq!(ex.sections, 1);
    }

    #[test]
    fn current_heading_markup() {
        let html = r#"
            <div class="mw-heading mw-heading2"><h2 id="Russia">Russia</h2><span class="mw-editsection">edit</span></div>
            <ul><li><a href="/wiki/FSB" title="Federal Security Service">FSB</a></li></ul>
            <div class="mw-heading mw-heading2"><h2 id="See_also">See also</h2></div>
            <ul><li><a href="/wiki/Spy">Spy</a></li></ul>
        "#;
        let ex = extract(html, &first_run());
        assert_eq!(ex.agencies.len(), 1);
        assert_eq!(ex.agencies[0].name, "Federal Security Service");
        assert_eq!(ex.agencies[0].country_code.as_deref(), Some("RU"));
    }
}
