//! Interactive login that writes one session file for the service pool.
//!
//! Usage: `tgf-login [name]` (default `session1`). Reads `TELEGRAM_API_ID`,
//! `TELEGRAM_API_HASH` and `SESSIONS_DIR` like the service does, then asks
//! for phone, login code and, if enabled, the 2FA password on stdin.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use grammers_client::SignInError;
use tgf_core::{config::Config, session::pool::SESSION_EXTENSION};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

const DEFAULT_NAME: &str = "session1";

fn session_path(dir: &Path, name: &str) -> PathBuf {
    let stem = name.strip_suffix(".session").unwrap_or(name);
    dir.join(format!("{stem}.{SESSION_EXTENSION}"))
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> anyhow::Result<String> {
    let mut out = tokio::io::stdout();
    out.write_all(label.as_bytes()).await?;
    out.flush().await?;
    let Some(line) = lines.next_line().await? else {
        bail!("stdin closed while waiting for {}", label.trim_end_matches(": "));
    };
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("loading configuration")?;
    let name = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_NAME.to_string());

    tokio::fs::create_dir_all(&cfg.sessions_dir)
        .await
        .with_context(|| format!("creating {}", cfg.sessions_dir.display()))?;
    let path = session_path(&cfg.sessions_dir, &name);

    let client = tgf_telegram::connect_client(&path, cfg.telegram_api_id, &cfg.telegram_api_hash, true)
        .await
        .context("connecting to telegram")?;

    if client.is_authorized().await.context("checking authorization")? {
        println!("Session already authorized: {}", path.display());
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let phone = prompt(&mut lines, "Phone number (international format): ").await?;
    let token = client
        .request_login_code(&phone)
        .await
        .context("requesting login code")?;
    let code = prompt(&mut lines, "Login code: ").await?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let label = match password_token.hint() {
                Some(hint) => format!("2FA password (hint: {hint}): "),
                None => "2FA password: ".to_string(),
            };
            let password = prompt(&mut lines, &label).await?;
            client
                .check_password(password_token, password.as_bytes())
                .await
                .context("checking 2FA password")?
        }
        Err(e) => return Err(e).context("signing in"),
    };

    client
        .session()
        .save_to_file(&path)
        .with_context(|| format!("saving {}", path.display()))?;

    println!(
        "Authorized as: {} ({})",
        user.first_name(),
        user.phone().unwrap_or("no phone")
    );
    println!("Session saved: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_files_get_the_pool_extension_once() {
        let dir = Path::new("/data/sessions");
        assert_eq!(
            session_path(dir, "alice"),
            PathBuf::from("/data/sessions/alice.session")
        );
        assert_eq!(
            session_path(dir, "alice.session"),
            PathBuf::from("/data/sessions/alice.session")
        );
    }
}
