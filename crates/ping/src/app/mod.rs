use std::{
    io::{BufRead, Write},
    sync::{Arc, Mutex},
};

use ping_core::{
    config::ConfigManager,
    init::get_ping_dir,
    prelude::*,
    trace::{install_miette_panic_hooks, install_tracing},
};

mod console;
use console::ConsoleLine;
pub use console::ConsoleWorld;

/// Entry point of the console host.
/// 1. opens the data directory
/// 2. installs logging into `ping.log`
/// 3. loads `ping_config.json`
/// 4. handles interactions from stdin until it is closed
pub fn start_ping() -> Result<()> {
    let ping_dir = get_ping_dir().wrap_err("failed to get ping directory")?;
    let _log_file_flush_guard = install_tracing(&ping_dir)?;
    install_miette_panic_hooks()?;
    let config_manager = ConfigManager::new(
        ping_dir
            .try_clone()
            .into_diagnostic()
            .wrap_err("failed to clone ping directory handle")?,
    )
    .wrap_err("failed to load config")?;
    info!(config = ?config_manager.config, "starting ping host");

    let stdin = std::io::stdin();
    let out = Arc::new(Mutex::new(std::io::stdout()));
    let handled = run_console(&config_manager.config, stdin.lock(), out)?;
    info!(handled, "stdin closed. shutting down");
    Ok(())
}

/// Feeds one json [`Interaction`] per input line into a [`PingHandler`] backed by a [`ConsoleWorld`].
///
/// Blank lines are skipped. Lines that fail to parse are logged and reported as `rejected`.
/// At the end of input every remaining marker is removed. Returns the number of handled interactions.
pub fn run_console<R, W>(config: &PingConfig, input: R, out: Arc<Mutex<W>>) -> Result<usize>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let world = Arc::new(ConsoleWorld::new(out));
    let service = Arc::new(
        MarkerService::new(config, world.clone()).wrap_err("failed to create marker service")?,
    );
    let handler = PingHandler::new(service.clone(), config.clone());

    let mut handled_count = 0;
    for (index, line) in input.lines().enumerate() {
        let line_number = index + 1;
        let line = line
            .into_diagnostic()
            .wrap_err("failed to read interaction from input")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Interaction>(&line) {
            Ok(interaction) => match handler.handle(&interaction) {
                Ok(handled) => {
                    handled_count += 1;
                    world.emit(&ConsoleLine::Handled {
                        line: line_number,
                        handled: &handled,
                    })
                }
                Err(e) => {
                    error!(?e, line = line_number, "failed to handle interaction");
                    world.emit(&ConsoleLine::Rejected {
                        line: line_number,
                        reason: e.to_string(),
                    })
                }
            },
            Err(e) => {
                warn!(?e, line = line_number, "skipping malformed interaction");
                world.emit(&ConsoleLine::Rejected {
                    line: line_number,
                    reason: e.to_string(),
                })
            }
        };
        reply
            .into_diagnostic()
            .wrap_err("failed to write to output")?;
    }

    let removed = service.remove_all();
    debug!(removed, "removed remaining markers");
    Ok(handled_count)
}

#[cfg(test)]
mod test {
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };

    use ping_core::prelude::*;
    use rstest::*;
    use serde_json::Value;

    use super::run_console;

    const PLACE: &str = r#"{"player":{"name":"A","permissions":["ping"]},"action":"right_click_block","held_item":{"kind":"STONE","is_block":true,"display_name":"!x"},"origin":{"world":"world","position":[0.0,1.6,0.0]},"hit":[0.0,0.0,4.0]}"#;
    const REMOVE: &str = r#"{"player":{"name":"A","permissions":["ping"]},"action":"left_click_air","held_item":{"kind":"STONE","is_block":true,"display_name":"!x"},"origin":{"world":"world","position":[0.0,1.6,0.0]},"hit":[1.0,1.0,5.0]}"#;
    const UNNAMED: &str = r#"{"player":{"name":"A","permissions":["ping"]},"action":"right_click_air","held_item":{"kind":"STONE","is_block":true},"origin":{"world":"world","position":[0.0,1.6,0.0]},"hit":[0.0,0.0,4.0]}"#;

    fn run(input: &str) -> (usize, Vec<Value>) {
        let out = Arc::new(Mutex::new(Vec::<u8>::new()));
        let handled = run_console(
            &PingConfig::default(),
            Cursor::new(input.to_string()),
            out.clone(),
        )
        .unwrap();
        let bytes = out.lock().unwrap().clone();
        let lines = String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (handled, lines)
    }

    fn events(lines: &[Value]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l["event"].as_str().unwrap().to_string())
            .collect()
    }

    #[rstest]
    fn place_then_remove() {
        let (handled, lines) = run(&format!("{PLACE}\n{REMOVE}\n"));
        assert_eq!(handled, 2);
        assert_eq!(
            events(&lines),
            vec!["spawn", "tune", "handled", "despawn", "handled"]
        );
        assert_eq!(lines[0]["request"]["group_tag"], "ping");
        assert_eq!(lines[0]["request"]["marker"]["key"]["label"], "x");
        assert_eq!(lines[2]["outcome"], "placed");
        assert_eq!(lines[2]["cancel_event"], true);
        assert_eq!(lines[4]["outcome"], "removed");
        assert_eq!(lines[4]["detail"].as_array().unwrap().len(), 1);
    }

    #[rstest]
    fn leftover_markers_are_removed_at_end_of_input() {
        let (handled, lines) = run(PLACE);
        assert_eq!(handled, 1);
        assert_eq!(events(&lines), vec!["spawn", "tune", "handled", "despawn"]);
    }

    #[rstest]
    fn malformed_and_blank_lines() {
        let (handled, lines) = run(&format!("\n{{not json\n{UNNAMED}\n"));
        assert_eq!(handled, 1);
        assert_eq!(events(&lines), vec!["rejected", "handled"]);
        assert_eq!(lines[0]["line"], 2);
        assert_eq!(lines[1]["outcome"], "ignored");
        assert_eq!(lines[1]["detail"], "no_display_name");
        assert_eq!(lines[1]["cancel_event"], false);
    }
}
