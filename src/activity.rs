//! Activity code parsing.
//!
//! Booking sheets carry a shorthand such as `OWC/3DD`, `AI 5DD x2` or
//! `DSD / EANX`. Each `/`-separated part is matched against an ordered rule
//! table; the first matching rule decides the part's category and base
//! counts. Parts are then summed and their categories folded into one
//! classification string.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ParsedActivity;

/// Category tag attached to one part of an activity code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityCategory {
    NonDiver,
    AllInclusive,
    Cash,
    OpenWaterCourse,
    AdvancedOpenWater,
    DiscoverScuba,
    Snorkeling,
    SkillUpgrade,
    SkillDevelopment,
    Refresher,
    DiveMaster,
    Sharing,
    EnrichedAir,
    NitroxCourse,
    CheckDive,
    Diver,
    Unknown,
}

impl ActivityCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityCategory::NonDiver => "NON DIVER",
            ActivityCategory::AllInclusive => "AI",
            ActivityCategory::Cash => "CASH",
            ActivityCategory::OpenWaterCourse => "OWC",
            ActivityCategory::AdvancedOpenWater => "AOW",
            ActivityCategory::DiscoverScuba => "DSD",
            ActivityCategory::Snorkeling => "Snorkeling",
            ActivityCategory::SkillUpgrade => "SD-UPG",
            ActivityCategory::SkillDevelopment => "SD",
            ActivityCategory::Refresher => "SR",
            ActivityCategory::DiveMaster => "DM",
            ActivityCategory::Sharing => "SHARING",
            ActivityCategory::EnrichedAir => "EANX",
            ActivityCategory::NitroxCourse => "NTX",
            ActivityCategory::CheckDive => "CD",
            ActivityCategory::Diver => "Diver",
            ActivityCategory::Unknown => "Unknown",
        }
    }

    /// Whether this category is appended to the primary activity in
    /// parentheses instead of standing on its own.
    pub fn is_additional_service(self) -> bool {
        ADDITIONAL_SERVICES.contains(&self)
    }
}

/// Categories reported as `(+...)` services.
pub const ADDITIONAL_SERVICES: [ActivityCategory; 10] = [
    ActivityCategory::AllInclusive,
    ActivityCategory::EnrichedAir,
    ActivityCategory::CheckDive,
    ActivityCategory::NitroxCourse,
    ActivityCategory::Refresher,
    ActivityCategory::SkillDevelopment,
    ActivityCategory::SkillUpgrade,
    ActivityCategory::OpenWaterCourse,
    ActivityCategory::AdvancedOpenWater,
    ActivityCategory::DiveMaster,
];

pub const UNKNOWN: &str = "Unknown";
pub const IGNORED: &str = "Ignored";

/// Sentinel written by the export for empty activity cells.
const NAN_SENTINEL: &str = "NAN";

struct ActivityRule {
    pattern: Regex,
    category: ActivityCategory,
    divers: u32,
    days: u32,
}

impl ActivityRule {
    fn new(pattern: &str, category: ActivityCategory, divers: u32, days: u32) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("valid activity rule regex"),
            category,
            divers,
            days,
        }
    }
}

// Evaluated top to bottom, first match wins. SD-UPG must stay ahead of SD.
static RULES: LazyLock<Vec<ActivityRule>> = LazyLock::new(|| {
    use ActivityCategory::*;
    vec![
        ActivityRule::new(r"(?i)\bND\b", NonDiver, 0, 0),
        ActivityRule::new(r"(?i)\bAI(?:\d+DD)?\b", AllInclusive, 1, 0),
        ActivityRule::new(r"(?i)\bCASH\b", Cash, 1, 0),
        ActivityRule::new(r"(?i)\bOWCD?\b", OpenWaterCourse, 1, 3),
        ActivityRule::new(r"(?i)\bAOW\b", AdvancedOpenWater, 1, 2),
        ActivityRule::new(r"(?i)\bDSD\b", DiscoverScuba, 1, 1),
        ActivityRule::new(r"(?i)\bSNK\b", Snorkeling, 0, 0),
        ActivityRule::new(r"(?i)\bSD-UPG\b", SkillUpgrade, 1, 2),
        ActivityRule::new(r"(?i)\bSD\b", SkillDevelopment, 1, 2),
        ActivityRule::new(r"(?i)\bSR\b", Refresher, 1, 1),
        ActivityRule::new(r"(?i)\bDM\b", DiveMaster, 1, 10),
        ActivityRule::new(r"(?i)\bSHARE\b", Sharing, 0, 0),
        ActivityRule::new(r"(?i)\bEANX\b", EnrichedAir, 1, 0),
        ActivityRule::new(r"(?i)\bNTX\b", NitroxCourse, 1, 0),
        ActivityRule::new(r"(?i)\bCD\b", CheckDive, 1, 0),
    ]
});

static RE_IGNORED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bINS\b|\bUnknown\b").expect("valid ignore regex"));
static RE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/+").expect("valid separator regex"));
static RE_DIVERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)x\s*(\d+)").expect("valid divers regex"));
static RE_DIVING_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)DD").expect("valid diving days regex"));

/// Parse one activity code. Never fails; unrecognised text contributes
/// nothing and ends up as "Unknown".
pub fn parse_activity(code: Option<&str>) -> ParsedActivity {
    let code = match code {
        Some(c) if c != NAN_SENTINEL => c,
        _ => return ParsedActivity::empty(UNKNOWN),
    };

    if RE_IGNORED.is_match(code) {
        return ParsedActivity::empty(IGNORED);
    }

    let mut divers = 0u32;
    let mut diving_days = 0u32;
    let mut primary: Vec<ActivityCategory> = Vec::new();
    let mut services: Vec<ActivityCategory> = Vec::new();

    for part in RE_SEPARATOR.split(code) {
        let parsed = parse_part(part.trim());
        divers = divers.saturating_add(parsed.divers);
        diving_days = diving_days.saturating_add(parsed.days);

        if parsed.category.is_additional_service() {
            services.push(parsed.category);
        } else if parsed.category != ActivityCategory::Unknown {
            primary.push(parsed.category);
        }
    }

    ParsedActivity {
        divers,
        diving_days,
        classification: compose_classification(primary, services),
    }
}

struct PartActivity {
    category: ActivityCategory,
    divers: u32,
    days: u32,
}

fn parse_part(part: &str) -> PartActivity {
    let matched = RULES.iter().find(|rule| rule.pattern.is_match(part));

    let mut result = match matched {
        Some(rule) => PartActivity {
            category: rule.category,
            divers: rule.divers,
            days: rule.days,
        },
        None => {
            let mut generic = PartActivity {
                category: ActivityCategory::Unknown,
                divers: 0,
                days: 0,
            };
            if let Some(n) = capture_number(&RE_DIVERS, part) {
                generic.divers = n;
            }
            if let Some(n) = capture_number(&RE_DIVING_DAYS, part) {
                generic.days = n;
                generic.category = ActivityCategory::Diver;
            }
            generic
        }
    };

    if result.category == ActivityCategory::AllInclusive {
        if let Some(n) = capture_number(&RE_DIVING_DAYS, part) {
            result.days = n;
        }
    }

    result
}

fn capture_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// "OWC/DSD (+AI, EANX)". With no primary type the first service takes
/// its place, so a lone "OWC" reads "OWC" and "OWC/AI" reads "OWC (+AI)".
fn compose_classification(
    mut primary: Vec<ActivityCategory>,
    mut services: Vec<ActivityCategory>,
) -> String {
    if primary.is_empty() && !services.is_empty() {
        primary.push(services.remove(0));
    }

    let mut classification = if primary.is_empty() {
        UNKNOWN.to_string()
    } else {
        primary
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/")
    };

    if !services.is_empty() {
        let joined = services
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        classification.push_str(&format!(" (+{})", joined));
    }

    classification
}

impl ParsedActivity {
    fn empty(classification: &str) -> Self {
        Self {
            divers: 0,
            diving_days: 0,
            classification: classification.to_string(),
        }
    }
}
