use std::rc::Rc;

use anyhow::{Context, Result};
use hashcall::codec::Value;
use hashcall::config::ResourceConfig;
use hashcall::invoker::memory::MemoryHost;
use hashcall::resource::Resource;
use hashcall::scripting::ScriptHost;
use tracing_subscriber::EnvFilter;

/// Upper bound on drain passes, for scripts that keep re-queueing work.
const MAX_PUMP_ROUNDS: usize = 64;

fn main() -> Result<()> {
    let mut conf_file = "conf/resource.yaml".to_string();
    let mut script_dir: Option<String> = None;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "--h" | "--?" | "/?" => {
                println!("Usage: resource_runner [--conf FILE] [--script DIR]");
                return Ok(());
            }
            "--conf" => {
                if i + 1 < args.len() {
                    i += 1;
                    conf_file = args[i].clone();
                } else {
                    eprintln!("Error: --conf requires a FILE argument");
                    return Ok(());
                }
            }
            "--script" => {
                if i + 1 < args.len() {
                    i += 1;
                    script_dir = Some(args[i].clone());
                } else {
                    eprintln!("Error: --script requires a DIR argument");
                    return Ok(());
                }
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = ResourceConfig::from_file(&conf_file)
        .with_context(|| format!("Cannot load config: {}", conf_file))?;
    if let Some(dir) = script_dir {
        config.script_dir = dir;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .with_context(|| format!("Invalid log filter: {}", config.log_filter))?;
    tracing_subscriber::fmt()
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_env_filter(filter)
        .init();

    let host = MemoryHost::new(config.resource_name.clone()).with_convars(config.convars.clone());
    let resource = Rc::new(Resource::with_config(&config, host));
    let scripts = ScriptHost::new(Rc::clone(&resource))?;

    let loaded = scripts
        .load_dir(&config.script_dir)
        .with_context(|| format!("Cannot load scripts from {}", config.script_dir))?;
    tracing::info!("[runner] [started] {} ({loaded} script(s))", config.resource_name);

    let name = Value::from(config.resource_name.as_str());
    if let Err(e) = resource.emit("onResourceStart", std::slice::from_ref(&name)) {
        tracing::warn!("[runner] onResourceStart: {e}");
    }

    // Scripts may have queued engine work during start; drain until quiet.
    for _ in 0..MAX_PUMP_ROUNDS {
        let report = resource.pump()?;
        for failure in &report.failures {
            tracing::warn!("[runner] {failure}");
        }
        if report.delivered == 0 {
            break;
        }
    }

    if let Err(e) = resource.emit("onResourceStop", std::slice::from_ref(&name)) {
        tracing::warn!("[runner] onResourceStop: {e}");
    }
    scripts.stop();

    let (calls, client_events) =
        resource.with_host(|h| (h.calls(), h.sent_client_events().len()))?;
    tracing::info!("[runner] [stopped] {calls} native call(s), {client_events} client event(s) sent");
    Ok(())
}
