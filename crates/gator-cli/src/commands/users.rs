use std::path::Path;

use anyhow::{bail, Result};

use gator_core::{storage::{Database, UserRepository}, AppConfig};

/// Create a user and make it the current one
pub async fn register(db: &Database, config: &mut AppConfig, config_path: &Path, name: &str) -> Result<()> {
    let user_repo = UserRepository::new(db);
    if user_repo.find_by_name(name).await?.is_some() {
        bail!("User '{}' already exists", name);
    }

    let user = user_repo.create(name).await?;
    config.general.current_user = Some(user.name.clone());
    config.save_to(config_path)?;

    println!("Registered user: {} ({})", user.name, user.id);
    Ok(())
}

/// Switch the current user to an existing one
pub async fn login(db: &Database, config: &mut AppConfig, config_path: &Path, name: &str) -> Result<()> {
    let Some(user) = UserRepository::new(db).find_by_name(name).await? else {
        bail!("User '{}' does not exist. Run 'gator register {}' first.", name, name);
    };

    config.general.current_user = Some(user.name.clone());
    config.save_to(config_path)?;

    println!("Logged in as {}", user.name);
    Ok(())
}

/// List users, marking the current one
pub async fn list(db: &Database, config: &AppConfig) -> Result<()> {
    let users = UserRepository::new(db).list_all().await?;

    if users.is_empty() {
        println!("No users yet. Run 'gator register <name>' to create one.");
        return Ok(());
    }

    let current = config.general.current_user.as_deref();
    for user in &users {
        if current == Some(user.name.as_str()) {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }

    Ok(())
}

/// Delete all users along with their feeds and posts
pub async fn reset(db: &Database, config: &mut AppConfig, config_path: &Path) -> Result<()> {
    let deleted = UserRepository::new(db).delete_all().await?;

    if config.general.current_user.take().is_some() {
        config.save_to(config_path)?;
    }

    println!("Reset complete. {} users deleted.", deleted);
    Ok(())
}
