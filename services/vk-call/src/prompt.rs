//! Terminal prompts for captcha answers and two-factor codes

use std::future::Future;
use std::io::{BufRead, Write};
use std::pin::Pin;

use vk_api::CaptchaSolver;
use vk_auth::TwoFactorProvider;

/// Shows the captcha image URL on stderr and reads the answer from stdin.
pub struct TerminalCaptchaSolver;

impl CaptchaSolver for TerminalCaptchaSolver {
    fn solve<'a>(
        &'a self,
        image_url: &'a str,
    ) -> Pin<Box<dyn Future<Output = vk_api::Result<String>> + Send + 'a>> {
        let prompt = format!("Captcha required, open {image_url}\nAnswer: ");
        Box::pin(async move {
            tokio::task::spawn_blocking(move || ask(&prompt))
                .await
                .map_err(|e| vk_api::Error::CaptchaSolver(e.to_string()))?
                .map_err(|e| vk_api::Error::CaptchaSolver(e.to_string()))
        })
    }

    fn report_incorrect(&self) {
        eprintln!("Captcha answer was rejected");
    }
}

/// Two-factor provider that asks on the terminal.
pub fn two_factor() -> TwoFactorProvider {
    TwoFactorProvider::from_fn(|| ask("Two-factor code: ").unwrap_or_default())
}

fn ask(prompt: &str) -> std::io::Result<String> {
    let mut stderr = std::io::stderr();
    stderr.write_all(prompt.as_bytes())?;
    stderr.flush()?;
    read_answer(std::io::stdin().lock())
}

/// First line of `reader`, trimmed. End of input is an error.
fn read_answer(mut reader: impl BufRead) -> std::io::Result<String> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "no answer on stdin",
        ));
    }
    Ok(line.trim().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn answer_is_trimmed_first_line() {
        let answer = read_answer(Cursor::new("  x7kq \nsecond line\n")).unwrap();
        assert_eq!(answer, "x7kq");
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = read_answer(Cursor::new("")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
