use super::{colorize_state, json_pretty, EXIT_SUCCESS};
use slipway_core::Engine;

pub fn run(engine: &Engine, address: &str, json: bool) -> Result<u8, String> {
    let record = engine.inspect(address).map_err(|e| e.to_string())?;
    if json {
        println!("{}", json_pretty(&record)?);
    } else {
        println!("address:      {}", record.address);
        println!("state:        {}", colorize_state(&record.state.to_string()));
        println!("sequence:     {}", record.sequence);
        println!(
            "provider_id:  {}",
            record.provider_id.as_deref().unwrap_or("(none)")
        );
        if let Some(error) = &record.last_error {
            println!("last_error:   {error}");
        }
        println!("created_at:   {}", record.created_at);
        println!("updated_at:   {}", record.updated_at);
    }
    Ok(EXIT_SUCCESS)
}
