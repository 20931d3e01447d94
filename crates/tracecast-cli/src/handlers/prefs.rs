//! Preferences command handler.

use std::sync::Arc;

use anyhow::Result;
use tracecast_core::{PreferenceService, PreferenceStore, UserPreference};

use crate::commands::PrefsCommand;

/// Execute the prefs command.
pub async fn execute(store: Arc<dyn PreferenceStore>, command: PrefsCommand) -> Result<()> {
    let service = PreferenceService::new(store);

    match command {
        PrefsCommand::Show => {}
        PrefsCommand::Voice { state } => {
            service.set_voice_enabled(state.enabled()).await?;
            println!("✓ Narration {}.", if state.enabled() { "on" } else { "off" });
        }
        PrefsCommand::Speed { preset } => {
            service.set_speed(preset).await?;
            println!("✓ Speed set to {preset}.");
        }
    }

    print_preference(&service.load().await?);
    Ok(())
}

fn print_preference(preference: &UserPreference) {
    println!("Voice: {}", if preference.voice_enabled { "on" } else { "off" });
    println!(
        "Speed: {} ({}x)",
        preference.speed,
        preference.speed.factor()
    );
}
