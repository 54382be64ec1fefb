/// Structural override for a section whose markup is known to be broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionQuirk {
    /// First entry sits as a link inside the paragraph after the heading
    /// instead of in a list.
    LeadInParagraph,
    /// A stray top-level heading with this label sits inside the section and
    /// does not end it. Any other heading ends the section as usual.
    SpuriousHeading { label: &'static str },
}

/// Document-shape rules for one taxonomy. Plain data so the resolver,
/// flattener and segmenter stay generic.
#[derive(Debug, Clone)]
pub struct ExtractRules {
    /// Section labels that never hold entries.
    pub skip_sections: &'static [&'static str],
    /// Exact leaf texts dropped before anything else is looked at.
    pub ignore_items: &'static [&'static str],
    /// Names the standard country registry does not know. `None` marks a
    /// known grouping with no ISO code.
    pub country_overrides: &'static [(&'static str, Option<&'static str>)],
    /// Sections that are organisations, not countries.
    pub non_countries: &'static [&'static str],
    pub quirks: &'static [(&'static str, SectionQuirk)],
    /// Origin prepended to relative hrefs.
    pub site_origin: &'static str,
}

pub const SKIP_SECTIONS: &[&str] = &["See also", "References", "External links", "Further reading"];

// Iran's section files army branches and the judiciary under intelligence.
pub const IGNORE_ITEMS: &[&str] = &[
    "Islamic Republic of Iran Army:",
    "Islamic Revolutionary Guard Corps:",
    "FARAJA",
    "Judicial system of the Islamic Republic of Iran",
    "Intelligence [12]",
    "Intelligence org",
];

pub const COUNTRY_OVERRIDES: &[(&str, Option<&str>)] = &[
    ("Brunei", Some("BN")),
    ("People's Republic of China", Some("CN")),
    ("Democratic Republic of the Congo", Some("CD")),
    ("Czech Republic", Some("CZ")),
    ("Iran", Some("IR")),
    ("Moldova", Some("MD")),
    ("North Korea", Some("KP")),
    ("Palestine", Some("PS")),
    ("Russia", Some("RU")),
    ("South Korea", Some("KR")),
    ("Syria", Some("SY")),
    ("Taiwan", Some("TW")),
    ("Tanzania", Some("TZ")),
    ("Trinidad & Tobago", Some("TT")),
    ("Turkey", Some("TR")),
    ("Venezuela", Some("VE")),
    ("Vietnam", Some("VN")),
    ("European Union", None),
    ("Shanghai Cooperation Organisation", None),
];

pub const NON_COUNTRIES: &[&str] = &["European Union", "Shanghai Cooperation Organisation"];

// Both entries track defects on the live page and may stop matching.
pub const QUIRKS: &[(&str, SectionQuirk)] = &[
    ("Gambia", SectionQuirk::LeadInParagraph),
    ("Bahamas", SectionQuirk::SpuriousHeading { label: "Security" }),
];

pub const WIKIPEDIA_ORIGIN: &str = "https://en.wikipedia.org";

impl Default for ExtractRules {
    fn default() -> Self {
        Self {
            skip_sections: SKIP_SECTIONS,
            ignore_items: IGNORE_ITEMS,
            country_overrides: COUNTRY_OVERRIDES,
            non_countries: NON_COUNTRIES,
            quirks: QUIRKS,
            site_origin: WIKIPEDIA_ORIGIN,
        }
    }
}

impl ExtractRules {
    pub fn is_skipped_section(&self, label: &str) -> bool {
        self.skip_sections.contains(&label)
    }

    pub fn is_ignored_item(&self, text: &str) -> bool {
        self.ignore_items.contains(&text)
    }

    pub fn is_non_country(&self, label: &str) -> bool {
        self.non_countries.contains(&label)
    }

    /// `Some(None)` means the override exists and says "no code".
    pub fn country_override(&self, label: &str) -> Option<Option<&'static str>> {
        self.country_overrides
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, code)| *code)
    }

    pub fn quirk_for(&self, section: &str) -> Option<SectionQuirk> {
        self.quirks
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, quirk)| *quirk)
    }
}
