//! Login, logout and password commands.
//!
//! # Environment Variables
//!
//! - `REALTY_PASSWORD` - Password to use instead of reading one line from
//!   stdin

use std::io::BufRead;

use realty_client::Portal;
use realty_core::RoleNamespace;
use secrecy::SecretString;
use thiserror::Error;

const PASSWORD_ENV: &str = "REALTY_PASSWORD";

/// Errors collecting a password.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to read password from stdin: {0}")]
    Io(#[from] std::io::Error),

    #[error("No password given (set {PASSWORD_ENV} or pipe one on stdin)")]
    Empty,
}

fn read_password() -> Result<SecretString, PasswordError> {
    if let Ok(password) = std::env::var(PASSWORD_ENV)
        && !password.is_empty()
    {
        return Ok(SecretString::from(password));
    }

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(PasswordError::Empty);
    }
    Ok(SecretString::from(password.to_string()))
}

pub async fn login(
    portal: &Portal,
    identifier: &str,
    role: RoleNamespace,
) -> Result<(), Box<dyn std::error::Error>> {
    let password = read_password()?;
    let outcome = portal.login(identifier, &password, role).await?;
    println!(
        "Signed in as {} ({}) in the {} slot",
        outcome.identity.display_name, outcome.identity.role_type, outcome.role
    );
    Ok(())
}

pub async fn logout(portal: &Portal, role: RoleNamespace) -> Result<(), Box<dyn std::error::Error>> {
    portal.logout(role).await?;
    println!("Signed out of {role}");
    Ok(())
}

pub async fn whoami(portal: &Portal) -> Result<(), Box<dyn std::error::Error>> {
    for role in RoleNamespace::ALL {
        match portal.sessions().principal(role).await {
            Some(identity) => println!(
                "{role}: {} <{}> ({})",
                identity.display_name, identity.email, identity.role_type
            ),
            None => println!("{role}: signed out"),
        }
    }
    Ok(())
}

pub async fn forgot_password(
    portal: &Portal,
    identifier: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    portal.resolver().forgot_password(identifier).await?;
    println!("If {identifier} has an account, a reset link is on its way");
    Ok(())
}

pub async fn reset_password(portal: &Portal, token: String) -> Result<(), Box<dyn std::error::Error>> {
    let new_password = read_password()?;
    portal
        .resolver()
        .reset_password(&SecretString::from(token), &new_password)
        .await?;
    println!("Password updated");
    Ok(())
}
