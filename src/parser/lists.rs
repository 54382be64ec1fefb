use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Selector};
use tracing::debug;

use super::rules::ExtractRules;

static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static ITALIC_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("i").unwrap());

/// One flattened list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub name: String,
    pub link: Option<String>,
    pub description: String,
    pub synonyms: Option<Vec<String>>,
}

/// A container of entries belonging to one section.
#[derive(Debug, Clone, Copy)]
pub enum EntryList<'a> {
    List(ElementRef<'a>),
    /// A single entry lifted out of surrounding prose.
    LoneLink(ElementRef<'a>),
}

pub fn flatten(entries: EntryList<'_>, rules: &ExtractRules) -> Vec<Leaf> {
    match entries {
        EntryList::List(list) => flatten_list(list, rules),
        EntryList::LoneLink(anchor) => leaf_from(anchor, rules).into_iter().collect(),
    }
}

/// Depth-first over direct `<li>` children. An item holding a nested list
/// is replaced by that list's items; only childless items become leaves.
fn flatten_list(list: ElementRef<'_>, rules: &ExtractRules) -> Vec<Leaf> {
    let mut leaves = Vec::new();
    let mut stack = vec![direct_items(list).into_iter()];

    while let Some(items) = stack.last_mut() {
        let Some(item) = items.next() else {
            stack.pop();
            continue;
        };

        let nested = nested_lists(item);
        if nested.is_empty() {
            leaves.extend(leaf_from(item, rules));
        } else {
            let children: Vec<_> = nested.into_iter().flat_map(direct_items).collect();
            stack.push(children.into_iter());
        }
    }

    leaves
}

fn direct_items(list: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    list.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .collect()
}

/// Outermost `<ul>` elements below `item`, in document order.
fn nested_lists(item: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut found = Vec::new();
    let mut pending: Vec<_> = child_elements(item);
    pending.reverse();

    while let Some(el) = pending.pop() {
        if el.value().name() == "ul" {
            found.push(el);
        } else {
            let mut children = child_elements(el);
            children.reverse();
            pending.extend(children);
        }
    }

    found
}

fn child_elements(el: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    el.children().filter_map(ElementRef::wrap).collect()
}

fn leaf_from(el: ElementRef<'_>, rules: &ExtractRules) -> Option<Leaf> {
    let raw: String = el.text().collect();
    let description = raw.trim();

    if rules.is_ignored_item(description) {
        debug!(item = description, "dropping ignored list item");
        return None;
    }

    let anchor = if el.value().name() == "a" {
        Some(el)
    } else {
        el.select(&LINK_SEL).find(|a| !is_fragment_link(a))
    };

    let name = anchor
        .and_then(|a| a.value().attr("title"))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(description);
    if name.is_empty() {
        debug!("skipping list item without text");
        return None;
    }

    let link = anchor
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| absolute_url(rules.site_origin, href));

    let italics: Vec<String> = el
        .select(&ITALIC_SEL)
        .map(|i| i.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Some(Leaf {
        name: name.to_string(),
        link,
        description: description.to_string(),
        synonyms: collapse_synonyms(italics, name),
    })
}

fn collapse_synonyms(synonyms: Vec<String>, name: &str) -> Option<Vec<String>> {
    match synonyms.as_slice() {
        [] => None,
        [only] if only == name => None,
        _ => Some(synonyms),
    }
}

// Citation markers like `#cite_note-3` point back into the same page.
fn is_fragment_link(a: &ElementRef<'_>) -> bool {
    a.value().attr("href").is_some_and(|href| href.starts_with('#'))
}

fn absolute_url(origin: &str, href: &str) -> Option<String> {
    let base = Url::parse(origin).ok()?;
    base.join(href).ok().map(|url| url.to_string())
}
