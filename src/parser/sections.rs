use std::sync::LazyLock;

use scraper::{ElementRef, Selector};
use thiserror::Error;
use tracing::warn;

use super::lists::EntryList;
use super::rules::{ExtractRules, SectionQuirk};

static HEADLINE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.mw-headline").unwrap());
static H2_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SectionError {
    #[error("section '{section}' has no list before the next heading")]
    MissingList { section: String },
    #[error("section '{section}' has no link in the paragraph after its heading")]
    MissingLeadLink { section: String },
}

/// Lists that belong to one section.
#[derive(Debug)]
pub struct Segment<'a> {
    pub lists: Vec<EntryList<'a>>,
    /// Stray `h2` elements swallowed by this section; they start no section
    /// of their own.
    pub absorbed: Vec<ElementRef<'a>>,
}

/// Label of a top-level heading, or `None` if `h2` does not open a section.
///
/// Legacy markup keeps the label in `span.mw-headline`; current markup wraps
/// the bare `h2` in `div.mw-heading2`.
pub fn heading_label(h2: ElementRef<'_>) -> Option<String> {
    let label = match h2.select(&HEADLINE_SEL).next() {
        Some(span) => span.text().collect::<String>(),
        None if is_wrapped_heading(h2) => h2.text().collect::<String>(),
        None => return None,
    };
    let label = label.trim();
    (!label.is_empty()).then(|| label.to_string())
}

fn is_wrapped_heading(h2: ElementRef<'_>) -> bool {
    h2.parent()
        .and_then(ElementRef::wrap)
        .is_some_and(|p| has_class(p, "mw-heading2"))
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// True for anything that ends a section.
pub fn is_section_boundary(el: ElementRef<'_>) -> bool {
    match el.value().name() {
        "h2" => true,
        "div" => has_class(el, "mw-heading2"),
        _ => false,
    }
}

pub fn segment<'a>(
    heading: ElementRef<'a>,
    section: &str,
    rules: &ExtractRules,
) -> Result<Segment<'a>, SectionError> {
    match rules.quirk_for(section) {
        Some(SectionQuirk::LeadInParagraph) => {
            let anchor = lead_in_link(heading, section)?;
            Ok(Segment {
                lists: vec![EntryList::LoneLink(anchor)],
                absorbed: Vec::new(),
            })
        }
        Some(SectionQuirk::SpuriousHeading { label }) => collect_lists(heading, section, Some(label)),
        None => collect_lists(heading, section, None),
    }
}

/// First list after the heading, then every sibling list up to the next
/// top-level heading. `stray` names one heading that is skipped over once.
fn collect_lists<'a>(
    heading: ElementRef<'a>,
    section: &str,
    stray: Option<&str>,
) -> Result<Segment<'a>, SectionError> {
    let first = within_section(heading)
        .find(|el| el.value().name() == "ul")
        .ok_or_else(|| SectionError::MissingList {
            section: section.to_string(),
        })?;

    let mut lists = vec![EntryList::List(first)];
    let mut absorbed = Vec::new();
    let mut stray = stray;

    let start = *first;
    for sibling in start.next_siblings().filter_map(ElementRef::wrap) {
        if is_section_boundary(sibling) {
            let Some(expected) = stray.take() else {
                break;
            };
            let h2 = heading_element(sibling);
            if h2.and_then(heading_label).as_deref() == Some(expected) {
                absorbed.extend(h2);
                continue;
            }
            warn!(section, expected, "next heading is not the stray one; document quirk may be stale");
            break;
        }
        if sibling.value().name() == "ul" {
            lists.push(EntryList::List(sibling));
        }
    }

    if let Some(expected) = stray {
        warn!(section, expected, "no stray heading found inside section; document quirk may be stale");
    }

    Ok(Segment { lists, absorbed })
}

fn lead_in_link<'a>(heading: ElementRef<'a>, section: &str) -> Result<ElementRef<'a>, SectionError> {
    if within_section(heading).any(|el| el.value().name() == "ul") {
        warn!(section, "section now has a list; lead-paragraph quirk may be stale");
    }

    within_section(heading)
        .find(|el| el.value().name() == "p")
        .and_then(|p| p.select(&LINK_SEL).next())
        .ok_or_else(|| SectionError::MissingLeadLink {
            section: section.to_string(),
        })
}

fn heading_element(boundary: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if boundary.value().name() == "h2" {
        Some(boundary)
    } else {
        boundary.select(&H2_SEL).next()
    }
}

/// Elements after `heading` in document order, stopping at the next
/// top-level heading.
fn within_section<'a>(heading: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    following(heading).take_while(|el| !is_section_boundary(*el))
}

fn following<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    let node = *el;
    std::iter::once(node)
        .chain(node.ancestors())
        .flat_map(|n| n.next_siblings())
        .flat_map(|n| n.descendants())
        .filter_map(ElementRef::wrap)
}
