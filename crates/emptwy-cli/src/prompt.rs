//! Interactive verifier prompt on the controlling terminal.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use emptwy_core::auth::{authorization_link, VerifierSource};
use emptwy_core::{EmptwyError, Result};

/// Asks the user to open the authorize link and type the PIN back
pub struct TerminalPrompt;

#[async_trait]
impl VerifierSource for TerminalPrompt {
    async fn obtain_verifier(&self, authorize_url: &str, request_token_key: &str) -> Result<String> {
        let link = authorization_link(authorize_url, request_token_key);

        // stdin reads block; keep them off the async workers
        tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            ask_for_verifier(&link, &mut input, &mut io::stderr())
        })
        .await
        .map_err(|e| EmptwyError::authentication(None, format!("verifier prompt failed: {}", e)))?
    }
}

fn ask_for_verifier(link: &str, input: &mut impl BufRead, output: &mut impl Write) -> Result<String> {
    let prompt_failed =
        |e: io::Error| EmptwyError::authentication(None, format!("verifier prompt failed: {}", e));

    writeln!(
        output,
        "Go to the following URL in your browser, authorize the application, and get the verification code:\n\t{}",
        link
    )
    .map_err(prompt_failed)?;
    write!(output, "Enter the verification code: ").map_err(prompt_failed)?;
    output.flush().map_err(prompt_failed)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(prompt_failed)?;

    let code = line.trim();
    if code.is_empty() {
        return Err(EmptwyError::authentication(
            None,
            "no verification code entered",
        ));
    }
    Ok(code.to_string())
}
