//! Example: Multi-period utility bill extraction
//!
//! Demonstrates a scalar field and its list-valued shadow field describing
//! the same billing periods, resolved independently. Uses the scripted
//! in-memory resolver so it runs without any backend.
//!
//! Run: `cargo run -p docfield --example multi_period`

use std::sync::Arc;

use docfield::prelude::*;

const SCHEMA: &str = r#"{
    "description": "Analyzer for utility bills with one or more billing periods",
    "scenario": "document",
    "config": {"returnDetails": true},
    "fieldSchema": {
        "name": "UtilityBillSchema",
        "fields": {
            "BillingPeriod": {
                "type": "string",
                "method": "extract",
                "description": "The billing period shown on the bill"
            },
            "ElectricityConsumption": {
                "type": "number",
                "method": "extract",
                "description": "Total electricity consumed in kWh"
            },
            "MultipleBillingPeriods": {
                "type": "string",
                "method": "generate",
                "description": "Every billing period on the bill as [{\"period\": \"DD/MM/YYYY\", \"consumption\": number}]"
            }
        }
    }
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    docfield::logging::init_tracing();

    let schema = load_schema(SCHEMA)?;

    // --- KEY CODE: one resolver answer per field ---
    let resolver = InMemoryResolver::new()
        .respond("BillingPeriod", "01/01/2023 - 31/03/2023")
        .respond("ElectricityConsumption", "Total: 1,234.5 kWh")
        .respond(
            "MultipleBillingPeriods",
            "Here are the periods I found:\n\
             [{\"period\": \"01/01/2023\", \"consumption\": 410.2},\n \
              {\"period\": \"2023-02-01\", \"consumption\": \"398,1\"},\n \
              {\"period\": \"01/03/2023\"}]",
        );
    let extractor = Extractor::new(schema, Arc::new(resolver));

    let result = extractor.extract(&Document::from_bytes(b"scanned bill".to_vec())).await;
    // --- END KEY CODE ---

    println!("{}", serde_json::to_string_pretty(&result)?);
    println!(
        "\n{} fields ok, {} failed, {} periods dropped",
        result.metrics().fields_ok,
        result.metrics().fields_failed,
        result
            .field("MultipleBillingPeriods")
            .map_or(0, |field| field.item_errors().len())
    );

    Ok(())
}
