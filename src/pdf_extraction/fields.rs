// Field extraction: document text -> one FlightRecord
use crate::lookup::{CarrierCodeMap, DelayReasonMap};
use crate::types::{FlightRecord, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

use super::grammar::{Field, Template};
use super::text_source::TextSource;

// Fuel totals line: "Total <uplift> <departure fuel> <arrival fuel>"
static FUEL_TOTALS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Total\s+[0-9]+\s+([0-9]+)\s+([0-9]+)").expect("fuel totals pattern is valid")
});

/// Where a document was filed. Supplies the fields that never come from the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    pub enquiry_no: String,
    pub filename: String,
}

impl FileContext {
    pub fn new(enquiry_no: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            enquiry_no: enquiry_no.into(),
            filename: filename.into(),
        }
    }

    /// Context taken from the file's own location: the parent folder names the enquiry.
    pub fn from_path(path: &Path) -> Self {
        let enquiry_no = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            enquiry_no,
            filename,
        }
    }
}

pub struct FieldExtractor {
    template: Template,
    carrier_codes: CarrierCodeMap,
    delay_reasons: DelayReasonMap,
}

impl FieldExtractor {
    pub fn new(template: Template, carrier_codes: CarrierCodeMap, delay_reasons: DelayReasonMap) -> Self {
        Self {
            template,
            carrier_codes,
            delay_reasons,
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Build a record from raw document text. Unmatched rules leave fields empty;
    /// this never fails.
    pub fn extract(&self, text: &str, context: &FileContext) -> FlightRecord {
        let mut record = FlightRecord {
            enquiry_no: context.enquiry_no.clone(),
            filename: context.filename.clone(),
            ..FlightRecord::default()
        };

        for (field, value) in self.template.apply(text) {
            match field {
                Field::Date => record.date = Some(value),
                Field::FlightNumber => record.flight_number = Some(value),
                Field::Registration => record.registration = Some(value),
                Field::Dep => record.dep = Some(value),
                Field::Arr => record.arr = Some(value),
                Field::Std => record.std = Some(value),
                Field::Sta => record.sta = Some(value),
                Field::Eta => record.eta = Some(value),
                Field::Etd => record.etd = Some(value),
                Field::Atd => record.atd = Some(value),
                Field::Ata => record.ata = Some(value),
                Field::Takeoff => record.takeoff = Some(value),
                Field::Landing => record.landing = Some(value),
                Field::FuelBurn => record.fuel_burn = value.parse().ok(),
                Field::DelayCode => record.delay_code = Some(value),
                Field::DelayDuration => record.delay_duration = Some(value),
                Field::Pax => record.pax = Some(value),
                Field::Payload => record.payload = Some(value),
                Field::ReasonOfCancellation => record.reason_of_cancellation = Some(value),
            }
        }

        if let Some(burn) = fuel_burn_from_totals(text) {
            record.fuel_burn = Some(burn);
        }

        record.flight_number = record
            .flight_number
            .map(|code| self.carrier_codes.normalize(&code));

        if let Some(code) = record.delay_code.as_deref().filter(|c| !c.trim().is_empty()) {
            record.delay_reason = Some(self.delay_reasons.describe(code).to_string());
        }

        debug!(
            file = %context.filename,
            template = self.template.name(),
            flight = record.flight_number.as_deref().unwrap_or(""),
            "extracted fields"
        );
        record
    }

    /// Read a document through `source` and extract it. Only an unreadable
    /// document is an error.
    pub fn extract_file(&self, source: &dyn TextSource, path: &Path, context: &FileContext) -> Result<FlightRecord> {
        let text = source.extract_text(path)?;
        Ok(self.extract(&text, context))
    }
}

/// Departure fuel minus arrival fuel from the totals line, if present.
fn fuel_burn_from_totals(text: &str) -> Option<i64> {
    let caps = FUEL_TOTALS.captures(text)?;
    let departure: i64 = caps.get(1)?.as_str().parse().ok()?;
    let arrival: i64 = caps.get(2)?.as_str().parse().ok()?;
    Some(departure - arrival)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE_REPORT: &str = "\
9H-SLD
Reg
Flight Date KM9001
Departure 11-Jul-25 DEL / Delhi
Arrival
11-Jul-25
Chhatrapati Shivaji Intl
BOM / Mumbai
OFF BLOCKS 09:00
AIRBORNE 09:12
LANDED 11:02
ON BLOCKS 11:10
Delays: 00:25, 07/A
Fuel
Total 1200 11220 5710
";

    fn extractor(template: &str) -> FieldExtractor {
        let exact = HashMap::from([("KM9001".to_string(), "QM101".to_string())]);
        let prefix = HashMap::from([("KM".to_string(), "QM".to_string())]);
        let reasons = HashMap::from([
            ("93".to_string(), "Aircraft rotation".to_string()),
            ("99".to_string(), "Miscellaneous".to_string()),
        ]);
        FieldExtractor::new(
            Template::builtin(template).unwrap(),
            CarrierCodeMap::new(exact, prefix),
            DelayReasonMap::new(reasons).unwrap(),
        )
    }

    #[test]
    fn test_extracts_current_template() {
        let context = FileContext::new("9H-SLD", "9H-SLD004311.pdf");
        let record = extractor("techlog-v2").extract(SAMPLE_REPORT, &context);

        assert_eq!(record.enquiry_no, "9H-SLD");
        assert_eq!(record.filename, "9H-SLD004311.pdf");
        assert_eq!(record.registration.as_deref(), Some("9H-SLD"));
        assert_eq!(record.date.as_deref(), Some("11-Jul-25"));
        assert_eq!(record.dep.as_deref(), Some("DEL"));
        assert_eq!(record.arr.as_deref(), Some("BOM"));
        assert_eq!(record.atd.as_deref(), Some("09:00"));
        assert_eq!(record.ata.as_deref(), Some("11:10"));
        assert_eq!(record.takeoff.as_deref(), Some("09:12"));
        assert_eq!(record.landing.as_deref(), Some("11:02"));
        assert_eq!(record.std, None);
        assert_eq!(record.sta, None);
        assert_eq!(record.delay_duration.as_deref(), Some("00:25"));
        assert_eq!(record.delay_code.as_deref(), Some("07/A"));
        assert_eq!(record.fuel_burn, Some(11220 - 5710));
    }

    #[test]
    fn test_flight_number_uses_exact_table_first() {
        let record = extractor("techlog-v2").extract(SAMPLE_REPORT, &FileContext::new("E1", "a.pdf"));
        assert_eq!(record.flight_number.as_deref(), Some("QM101"));

        let other = SAMPLE_REPORT.replace("KM9001", "KM7702");
        let record = extractor("techlog-v2").extract(&other, &FileContext::new("E1", "a.pdf"));
        assert_eq!(record.flight_number.as_deref(), Some("QM7702"));
    }

    #[test]
    fn test_unknown_delay_code_uses_fallback_reason() {
        let record = extractor("techlog-v2").extract(SAMPLE_REPORT, &FileContext::new("E1", "a.pdf"));
        assert_eq!(record.delay_reason.as_deref(), Some("Miscellaneous"));

        let known = SAMPLE_REPORT.replace("07/A", "93/B");
        let record = extractor("techlog-v2").extract(&known, &FileContext::new("E1", "a.pdf"));
        assert_eq!(record.delay_reason.as_deref(), Some("Aircraft rotation"));
    }

    #[test]
    fn test_missing_fields_are_empty_not_errors() {
        let record = extractor("techlog-v2").extract("blank page\n", &FileContext::new("E1", "a.pdf"));
        assert_eq!(record.enquiry_no, "E1");
        assert_eq!(record.flight_number, None);
        assert_eq!(record.fuel_burn, None);
        assert_eq!(record.delay_reason, None);
    }

    #[test]
    fn test_legacy_template_reads_printed_fuel_burn() {
        let legacy = "TechLog No. 12-Mar-24\nFlight Date AB123\nOFF BLOCKS 06:00\nAIRBORNE 06:10\nFuel Burn: 4100\nPayload 9800\n";
        let record = extractor("techlog-v1").extract(legacy, &FileContext::new("E2", "b.pdf"));
        assert_eq!(record.date.as_deref(), Some("12-Mar-24"));
        assert_eq!(record.std.as_deref(), Some("06:00"));
        assert_eq!(record.atd.as_deref(), Some("06:10"));
        assert_eq!(record.takeoff.as_deref(), Some("06:10"));
        assert_eq!(record.fuel_burn, Some(4100));
        assert_eq!(record.payload.as_deref(), Some("9800"));
    }

    #[test]
    fn test_totals_line_overrides_printed_fuel_burn() {
        let legacy = "Fuel Burn: 4100\nTotal 0 9000 3000\n";
        let record = extractor("techlog-v1").extract(legacy, &FileContext::new("E2", "b.pdf"));
        assert_eq!(record.fuel_burn, Some(6000));
    }

    #[test]
    fn test_context_from_path_uses_parent_folder() {
        let context = FileContext::from_path(Path::new("/data/To_Be_Processed/9H-SLE/9H-SLE005382.pdf"));
        assert_eq!(context.enquiry_no, "9H-SLE");
        assert_eq!(context.filename, "9H-SLE005382.pdf");
    }
}
