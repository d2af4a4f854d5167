//! Subcommand implementations.

pub mod console;
pub mod favorites;
pub mod session;

use realty_client::Portal;

/// Print and clear the notices raised while the command ran.
pub fn print_notices(portal: &Portal) {
    for notice in portal.notices().drain() {
        if notice.is_dismissible() {
            eprintln!("{notice}");
        } else {
            eprintln!("! {notice}");
        }
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
