use std::num::NonZeroU16;

use poise::serenity_prelude as serenity;
use tracing::info;

use crate::messages::PROCESSING_MESSAGE;
use crate::queue::DataPacket;
use crate::verification::VerificationRequest;
use crate::{Context, Error};

/// Generate a link with user specific token to link with RDS backend
#[poise::command(slash_command, guild_only)]
pub async fn verify(ctx: Context<'_>) -> Result<(), Error> {
    let poise::Context::Application(app_ctx) = ctx else {
        return Err("verify is only available as a slash command".into());
    };
    let request = request_from_interaction(app_ctx.interaction);

    // Reply first so the worker always has an original response to edit
    ctx.send(
        poise::CreateReply::default()
            .content(PROCESSING_MESSAGE)
            .ephemeral(true),
    )
    .await?;

    let packet = DataPacket::from(&request);
    ctx.data().queue.send(&packet).await?;

    info!(
        "Queued verification {} for {} (ID: {})",
        packet.id, request.user_name, request.user_id
    );
    Ok(())
}

fn request_from_interaction(interaction: &serenity::CommandInteraction) -> VerificationRequest {
    let user = &interaction.user;
    let member = interaction.member.as_deref();

    let avatar_hash = member
        .and_then(|m| m.avatar)
        .or(user.avatar)
        .map(|hash| hash.to_string())
        .unwrap_or_default();
    let joined_at = member
        .and_then(|m| m.joined_at)
        .map(|ts| ts.to_string())
        .unwrap_or_default();

    VerificationRequest {
        user_id: user.id.to_string(),
        user_name: user.name.clone(),
        discriminator: format_discriminator(user.discriminator),
        avatar_hash,
        joined_at,
        channel_id: interaction.channel_id.to_string(),
        interaction_token: interaction.token.clone(),
        application_id: interaction.application_id.to_string(),
    }
}

/// Legacy four digit tag, or "0" for migrated usernames
fn format_discriminator(discriminator: Option<NonZeroU16>) -> String {
    discriminator
        .map(|d| format!("{:04}", d.get()))
        .unwrap_or_else(|| "0".to_string())
}
