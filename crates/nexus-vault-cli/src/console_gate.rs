//! Terminal stand-in for a biometric prompt.
//!
//! A desktop terminal has no sensor, so presence is approximated by an
//! explicit y/N confirmation on stdin.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use nexus_vault::{BiometricGate, GateOutcome, GatePurpose, PreparedCipher, PresenceAuthority};

pub struct ConsoleGate {
    authority: PresenceAuthority,
}

impl ConsoleGate {
    pub fn new(authority: PresenceAuthority) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl BiometricGate for ConsoleGate {
    async fn authenticate(&self, purpose: GatePurpose, cipher: PreparedCipher) -> GateOutcome {
        let title = purpose.prompt_title();
        let answer = tokio::task::spawn_blocking(move || confirm(title)).await;

        match answer {
            Ok(Ok(true)) => GateOutcome::Authenticated(self.authority.attest(cipher)),
            Ok(Ok(false)) => GateOutcome::denied("user declined the prompt"),
            Ok(Err(e)) => GateOutcome::error(format!("failed to read confirmation: {e}")),
            Err(e) => GateOutcome::error(format!("prompt task failed: {e}")),
        }
    }
}

fn confirm(title: &str) -> io::Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "  {title} [y/N]: ")?;
    stderr.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "Yes"))
}
