use super::{json_pretty, load_configuration, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use slipway_core::{ApplyOptions, Engine, StateLock};

pub fn run(engine: &Engine, source: &str, jobs: usize, json: bool) -> Result<u8, String> {
    let mut config = load_configuration(source)?;
    let _lock = StateLock::acquire(engine.state_layout())
        .map_err(|e| format!("state lock: {e}"))?;

    let pb = if json {
        None
    } else {
        Some(spinner(&format!("applying with the {} backend...", engine.backend())))
    };

    let report = match engine.apply_with_options(&mut config, ApplyOptions { jobs: jobs.max(1) }) {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, &format!("applied {} resources", r.applied.len()));
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "apply failed");
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        for address in &report.applied {
            let note = if report.previously_recorded.contains(address) {
                " (converged)"
            } else {
                ""
            };
            println!("  {address}{note}");
        }
    }
    Ok(EXIT_SUCCESS)
}
