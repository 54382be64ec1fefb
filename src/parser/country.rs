use super::iso3166;
use super::rules::ExtractRules;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Country {
    pub code: Option<String>,
    pub name: Option<String>,
}

/// Map a section title to ISO code + display name.
///
/// Standard registry first, then the override table. Organisations keep
/// neither name nor code. An unknown title is not an error: the code is
/// simply left out.
pub fn resolve(section: &str, rules: &ExtractRules) -> Country {
    let code = iso3166::alpha2_by_name(section)
        .or_else(|| rules.country_override(section).flatten())
        .map(str::to_string);

    let name = if rules.is_non_country(section) {
        None
    } else {
        Some(section.to_string())
    };

    Country { code, name }
}
