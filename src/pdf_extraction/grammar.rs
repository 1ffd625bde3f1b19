// Report template grammar: an ordered, declarative table of field rules
//
// Each carrier/format version is one `Template`. Adding a format means adding a
// rule table here; the extractor's control flow does not change.

use crate::types::{Result, TechlogError};
use regex::Regex;

pub const DEFAULT_TEMPLATE: &str = "techlog-v2";

/// Fields a template can fill directly from document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    FlightNumber,
    Registration,
    Dep,
    Arr,
    Std,
    Sta,
    Eta,
    Etd,
    Atd,
    Ata,
    Takeoff,
    Landing,
    FuelBurn,
    DelayCode,
    DelayDuration,
    Pax,
    Payload,
    ReasonOfCancellation,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Date => "Date",
            Field::FlightNumber => "FlightNumber",
            Field::Registration => "Registration",
            Field::Dep => "Dep",
            Field::Arr => "Arr",
            Field::Std => "STD",
            Field::Sta => "STA",
            Field::Eta => "ETA",
            Field::Etd => "ETD",
            Field::Atd => "ATD",
            Field::Ata => "ATA",
            Field::Takeoff => "TO",
            Field::Landing => "LDG",
            Field::FuelBurn => "FuelBurn",
            Field::DelayCode => "DelayCode",
            Field::DelayDuration => "DelayDuration",
            Field::Pax => "Pax",
            Field::Payload => "Payload",
            Field::ReasonOfCancellation => "ReasonOfCancellation",
        }
    }
}

/// Where a field's value comes from in a given template.
#[derive(Debug, Clone)]
pub enum RuleSource {
    /// First non-empty capture group of the first match, trimmed.
    Pattern(Regex),
    /// The report format has no such field; it is always left empty.
    NotInTemplate,
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: Field,
    pub source: RuleSource,
}

impl FieldRule {
    pub fn apply(&self, text: &str) -> Option<String> {
        let RuleSource::Pattern(re) = &self.source else {
            return None;
        };
        let caps = re.captures(text)?;
        caps.iter()
            .skip(1)
            .flatten()
            .map(|m| m.as_str().trim())
            .find(|v| !v.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    rules: Vec<FieldRule>,
}

type RuleTable = &'static [(Field, Option<&'static str>)];

// Current carrier format. Scheduled/estimated times are not printed on it.
const TECHLOG_V2: RuleTable = &[
    (Field::Date, Some(r"Departure\s*([^\s]+)")),
    (Field::FlightNumber, Some(r"Flight Date\s*([A-Z0-9]{3,10})")),
    (Field::Registration, Some(r"(?m)^([A-Z0-9-]+)\s*\r?\nReg$")),
    (Field::Dep, Some(r"Departure\s*(?:[0-9]{2}-[A-Za-z]{3}-[0-9]{2})\s*([A-Z]{3})\s*/")),
    (
        Field::Arr,
        Some(r"Arrival\s*\r?\n[0-9]{2}-[A-Za-z]{3}-[0-9]{2}\s*\r?\n(?:.*\r?\n)?([A-Z]{3})\s*/"),
    ),
    (Field::Std, None),
    (Field::Sta, None),
    (Field::Eta, None),
    (Field::Etd, None),
    (Field::Atd, Some(r"OFF BLOCKS\s*([0-9]{2}:[0-9]{2})")),
    (Field::Ata, Some(r"ON BLOCKS\s*([0-9]{2}:[0-9]{2})")),
    (Field::Takeoff, Some(r"AIRBORNE\s*([0-9]{2}:[0-9]{2})")),
    (Field::Landing, Some(r"LANDED\s*([0-9]{2}:[0-9]{2})")),
    (Field::FuelBurn, None),
    (Field::DelayCode, Some(r"Delays:\s*[0-9]{2}:[0-9]{2},\s*([0-9/A-Z]+)")),
    (Field::DelayDuration, Some(r"Delays:\s*([0-9]{2}:[0-9]{2})")),
    (Field::Pax, None),
    (Field::Payload, None),
    (Field::ReasonOfCancellation, None),
];

// Legacy format: block times were filed as scheduled times and the airborne/landed
// times double as actuals. Fuel burn and payload are printed directly.
const TECHLOG_V1: RuleTable = &[
    (Field::Date, Some(r"TechLog No\.\s*([^\s]+)")),
    (Field::FlightNumber, Some(r"Flight Date\s*([A-Z0-9]{3,10})")),
    (Field::Registration, Some(r"(?m)^([A-Z0-9-]+)\s*\r?\nReg$")),
    (Field::Dep, Some(r"Departure\s*(?:[0-9]{2}-[A-Za-z]{3}-[0-9]{2})\s*([A-Z]{3})\s*/")),
    (
        Field::Arr,
        Some(r"Arrival\s*\r?\n[0-9]{2}-[A-Za-z]{3}-[0-9]{2}\s*\r?\n.*\r?\n([A-Z]{3})\s*/"),
    ),
    (Field::Std, Some(r"OFF BLOCKS\s*([0-9]{2}:[0-9]{2})")),
    (Field::Sta, Some(r"ON BLOCKS\s*([0-9]{2}:[0-9]{2})")),
    (Field::Etd, None),
    (Field::Eta, None),
    (Field::Atd, Some(r"AIRBORNE\s*([0-9]{2}:[0-9]{2})")),
    (Field::Ata, Some(r"LANDED\s*([0-9]{2}:[0-9]{2})")),
    (Field::Takeoff, Some(r"AIRBORNE\s*([0-9]{2}:[0-9]{2})")),
    (Field::Landing, Some(r"LANDED\s*([0-9]{2}:[0-9]{2})")),
    (Field::FuelBurn, Some(r"Fuel Burn[:\s]*([0-9]+)")),
    (Field::DelayCode, None),
    (Field::DelayDuration, None),
    (Field::Pax, None),
    (Field::Payload, Some(r"Payload[:\s]*([0-9]+)")),
    (Field::ReasonOfCancellation, None),
];

pub const BUILTIN_TEMPLATES: &[&str] = &["techlog-v2", "techlog-v1"];

impl Template {
    /// Compile one of the built-in templates by name.
    pub fn builtin(name: &str) -> Result<Self> {
        let table = match name {
            "techlog-v2" => TECHLOG_V2,
            "techlog-v1" => TECHLOG_V1,
            other => return Err(TechlogError::UnknownTemplate(other.to_string())),
        };
        Self::compile(name, table)
    }

    pub fn compile(name: &str, table: &[(Field, Option<&str>)]) -> Result<Self> {
        let mut rules = Vec::with_capacity(table.len());
        for (field, pattern) in table {
            let source = match pattern {
                Some(p) => RuleSource::Pattern(Regex::new(p).map_err(|source| {
                    TechlogError::Pattern {
                        field: field.name(),
                        source,
                    }
                })?),
                None => RuleSource::NotInTemplate,
            };
            rules.push(FieldRule {
                field: *field,
                source,
            });
        }
        Ok(Self {
            name: name.to_string(),
            rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Apply every rule in order. Fields without a match are simply absent.
    pub fn apply(&self, text: &str) -> Vec<(Field, String)> {
        self.rules
            .iter()
            .filter_map(|rule| rule.apply(text).map(|v| (rule.field, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_templates_compile() {
        for name in BUILTIN_TEMPLATES {
            let template = Template::builtin(name).unwrap();
            assert_eq!(template.rules().len(), 19);
        }
        assert!(matches!(
            Template::builtin("techlog-v9"),
            Err(TechlogError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_not_in_template_never_matches() {
        let template = Template::builtin("techlog-v2").unwrap();
        let std_rule = template
            .rules()
            .iter()
            .find(|r| r.field == Field::Std)
            .unwrap();
        assert!(std_rule.apply("").is_none());
        assert!(std_rule.apply("STD 10:00\n\n").is_none());
    }

    #[test]
    fn test_first_non_empty_group_wins() {
        let template = Template::compile(
            "alt",
            &[(Field::Pax, Some(r"PAX\s*(?:([0-9]+)|-\s*([0-9]+))"))],
        )
        .unwrap();
        assert_eq!(template.apply("PAX - 42"), vec![(Field::Pax, "42".to_string())]);
        assert_eq!(template.apply("PAX 17"), vec![(Field::Pax, "17".to_string())]);
        assert!(template.apply("nothing here").is_empty());
    }

    #[test]
    fn test_bad_pattern_is_reported() {
        let err = Template::compile("broken", &[(Field::Pax, Some(r"([0-9]"))]).unwrap_err();
        assert!(matches!(err, TechlogError::Pattern { field: "Pax", .. }));
    }
}
