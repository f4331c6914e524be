use anyhow::Result;

use crate::config::Config;
use crate::drive::DriveClient;
use recipebox_core::auth::Session;

use super::Options;

/// Check the token against Google, then remember it.
pub(crate) async fn cmd_login(
    config: &Config,
    opts: &Options,
    token: &str,
    json: bool,
) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("Access token must not be empty");
    }
    let user = DriveClient::new(opts.upload_mode).user_info(token).await?;
    let session = Session {
        access_token: token.to_string(),
        user: Some(user.clone()),
    };
    config.save_session(&session)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        let email = &user.email;
        if user.name.is_empty() {
            println!("Logged in as {email}");
        } else {
            let name = &user.name;
            println!("Logged in as {name} <{email}>");
        }
    }
    Ok(())
}

pub(crate) fn cmd_logout(config: &Config, json: bool) -> Result<()> {
    let removed = config.clear_session()?;
    if json {
        println!("{}", serde_json::json!({ "logged_out": removed }));
    } else if removed {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

pub(crate) fn cmd_whoami(config: &Config, json: bool) -> Result<()> {
    let Some(session) = config.load_session()? else {
        super::helpers::exit_not_found("Not logged in", json);
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "signed_in": true, "user": session.user })
        );
        return Ok(());
    }

    match session.user {
        Some(user) if !user.name.is_empty() => {
            let (name, email) = (&user.name, &user.email);
            println!("{name} <{email}>");
        }
        Some(user) => println!("{}", user.email),
        None => println!("Logged in (no profile saved)"),
    }
    Ok(())
}
