use std::process::ExitCode;

use dashgrab::Orchestrator;

// Exit codes: 0 = done (possibly degraded), 1 = usage, 2 = nothing usable
const EXIT_USAGE: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let url = match args.next() {
        Some(url) => url,
        None => {
            eprintln!("Usage: dashgrab <video-page-url>");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let orchestrator = Orchestrator::with_defaults();
    match orchestrator.run(&url).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                // The one contract output: a single JSON document on stdout
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("[dashgrab] Failed to serialize report: {}", e);
                ExitCode::from(EXIT_FATAL)
            }
        },
        Err(e) => {
            eprintln!("[dashgrab] {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
