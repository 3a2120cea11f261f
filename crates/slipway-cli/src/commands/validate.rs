use super::{json_pretty, load_configuration, EXIT_SUCCESS};
use slipway_core::DependencyGraph;
use slipway_schema::resolve;

pub fn run(source: &str, json: bool) -> Result<u8, String> {
    let mut config = load_configuration(source)?;
    resolve(&mut config).map_err(|e| format!("reference error: {e}"))?;
    let graph = DependencyGraph::build(&config).map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "valid": true,
            "resources": graph.len(),
            "levels": graph.levels().len(),
            "order": graph.apply_addresses(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "configuration valid: {} resources in {} levels",
            graph.len(),
            graph.levels().len()
        );
    }
    Ok(EXIT_SUCCESS)
}
