use super::{colorize_state, json_pretty, EXIT_SUCCESS};
use slipway_core::Engine;

pub fn run(engine: &Engine, json: bool) -> Result<u8, String> {
    let records = engine.list().map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&records)?);
    } else if records.is_empty() {
        println!("no resources recorded");
    } else {
        println!("{:<32} {:<14} {:<18} UPDATED", "ADDRESS", "STATE", "PROVIDER_ID");
        for record in &records {
            println!(
                "{:<32} {:<14} {:<18} {}",
                record.address.to_string(),
                colorize_state(&record.state.to_string()),
                record.provider_id.as_deref().unwrap_or("-"),
                record.updated_at
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
