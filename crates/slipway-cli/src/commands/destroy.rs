use super::{json_pretty, load_configuration, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use slipway_core::{CoreError, Engine, StateLock};

pub fn run(engine: &Engine, source: Option<&str>, all: bool, json: bool) -> Result<u8, String> {
    let mut config = match source {
        Some(source) if !all => Some(load_configuration(source)?),
        _ => None,
    };
    let _lock = StateLock::acquire(engine.state_layout())
        .map_err(|e| format!("state lock: {e}"))?;

    let pb = if json {
        None
    } else {
        Some(spinner("destroying resources..."))
    };

    let result = match config.as_mut() {
        Some(config) => engine.destroy(config),
        None => engine.destroy_recorded(),
    };

    let report = match result {
        Ok(r) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, &format!("destroyed {} resources", r.destroyed.len()));
            }
            r
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "destroy incomplete");
            }
            if let CoreError::DestroyIncomplete { failures, skipped } = &e {
                for (address, error) in failures {
                    eprintln!("  failed  {address}: {error}");
                }
                for address in skipped {
                    eprintln!("  skipped {address}");
                }
            }
            return Err(e.to_string());
        }
    };

    if json {
        println!("{}", json_pretty(&report)?);
    } else if report.destroyed.is_empty() {
        println!("nothing to destroy");
    } else {
        for address in &report.destroyed {
            println!("  {address}");
        }
    }
    Ok(EXIT_SUCCESS)
}
