//! Favorites commands.

use realty_client::Portal;
use realty_core::PropertyId;

pub async fn list(portal: &Portal) -> Result<(), Box<dyn std::error::Error>> {
    let ids = portal.favorites().list().await?;
    super::print_json(&ids)?;
    Ok(())
}

pub async fn add(portal: &Portal, id: PropertyId) -> Result<(), Box<dyn std::error::Error>> {
    if portal.favorites().add(id).await? {
        println!("Added property {id}");
    } else {
        println!("Property {id} is already a favorite");
    }
    Ok(())
}

pub async fn remove(portal: &Portal, id: PropertyId) -> Result<(), Box<dyn std::error::Error>> {
    if portal.favorites().remove(id).await? {
        println!("Removed property {id}");
    } else {
        println!("Property {id} was not a favorite");
    }
    Ok(())
}

pub async fn toggle(portal: &Portal, id: PropertyId) -> Result<(), Box<dyn std::error::Error>> {
    let now = portal.favorites().toggle(id).await?;
    println!("Property {id} {}", if now { "added" } else { "removed" });
    Ok(())
}
