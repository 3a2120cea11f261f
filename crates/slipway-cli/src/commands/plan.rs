use super::{colorize_state, json_pretty, load_configuration, EXIT_SUCCESS};
use slipway_core::Engine;

pub fn run(engine: &Engine, source: &str, json: bool) -> Result<u8, String> {
    let mut config = load_configuration(source)?;
    let plan = engine.plan(&mut config).map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&plan)?);
        return Ok(EXIT_SUCCESS);
    }
    if plan.is_empty() {
        println!("nothing to apply");
        return Ok(EXIT_SUCCESS);
    }

    println!("{:<5} {:<6} {:<32} {:<14} DEPENDS ON", "SEQ", "LEVEL", "ADDRESS", "RECORDED");
    for step in &plan.steps {
        let recorded = step
            .recorded
            .map_or_else(|| "-".to_owned(), |s| colorize_state(&s.to_string()));
        let dependencies: Vec<String> = step.dependencies.iter().map(ToString::to_string).collect();
        println!(
            "{:<5} {:<6} {:<32} {:<14} {}",
            step.sequence,
            step.level,
            step.address.to_string(),
            recorded,
            dependencies.join(", ")
        );
    }
    println!(
        "{} resources, {} not yet recorded",
        plan.len(),
        plan.pending().count()
    );
    Ok(EXIT_SUCCESS)
}
