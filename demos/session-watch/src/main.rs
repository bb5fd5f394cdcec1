//! Logs in (or resumes a saved session) and reports its countdown until it
//! expires or Ctrl-C is pressed.
//!
//! ```text
//! CLASSGATE_API_URI=http://localhost:8080/api \
//! CLASSGATE_STORAGE_PATH=/tmp/classgate.json \
//!     cargo run -p session-watch -- alice secret
//! ```

use classgate::prelude::*;

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
struct Credentials {
    username: String,
    password: String,
}

/// `<username> <password>` from the command line, if both are present.
fn credentials(mut args: impl Iterator<Item = String>) -> Option<Credentials> {
    let username = args.next()?;
    let password = args.next()?;
    Some(Credentials { username, password })
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    classgate::init_tracing();

    let client = Classgate::builder()
        .config(ClassgateConfig::from_env()?)
        .build()?;

    let principal = match client.restore() {
        Some(principal) => principal,
        None => {
            let Some(creds) = credentials(std::env::args().skip(1)) else {
                eprintln!("no saved session; usage: session-watch <username> <password>");
                return Ok(());
            };
            client.login(&creds.username, &creds.password).await?.principal
        }
    };
    tracing::info!(user = %principal.username, role = ?principal.role, "session active");

    let monitor = client.start_monitor()?;
    let warning = client.start_warning()?;
    let mut statuses = monitor.subscribe();
    let mut warnings = warning.subscribe();

    loop {
        let status = monitor.status();
        if !status.is_valid {
            println!("session ended");
            break;
        }
        println!("session valid, {} left", status.remaining_display());

        tokio::select! {
            changed = statuses.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = warnings.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = warnings.borrow_and_update().clone();
                if current.should_show {
                    println!("[{}] {}", client.config().locale.badge_label(), current.message);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("interrupted");
                break;
            }
        }
    }

    client.shutdown();
    Ok(())
}
